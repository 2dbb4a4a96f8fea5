//! Risk handling for numbers whose applicant has left.

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use tracing::info;

use crate::common::{today, EmployeeId, ServiceError, ServiceResult};
use crate::domains::employees::activities::require_active_employee;
use crate::domains::numbers::models::{ApplicantChange, MobileNumber, NumberStatus};
use crate::kernel::ServerDeps;

use super::possession::{lock_number, release_holder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    ChangeApplicant,
    Reclaim,
    Deactivate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleRiskInput {
    pub action: RiskAction,
    /// Required for `change_applicant`.
    pub new_applicant_id: Option<EmployeeId>,
    pub remarks: Option<String>,
}

/// Resolve a `risk_pending` number.
pub async fn handle_risk(
    phone: &str,
    input: HandleRiskInput,
    operator_id: &EmployeeId,
    deps: &ServerDeps,
) -> ServiceResult<MobileNumber> {
    let mut tx = deps.db_pool.begin().await?;
    let mut number = lock_number(phone, &mut tx).await?;

    if number.status != NumberStatus::RiskPending {
        return Err(ServiceError::invalid_state(format!(
            "number {} is {:?}; risk handling needs risk_pending",
            number.phone, number.status
        )));
    }

    require_active_employee(operator_id, &mut tx).await?;

    let remarks = input
        .remarks
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let on = today();

    match input.action {
        RiskAction::ChangeApplicant => {
            let new_applicant_id = input.new_applicant_id.as_ref().ok_or_else(|| {
                ServiceError::validation("newApplicantId is required to change the applicant")
            })?;
            let new_applicant = require_active_employee(new_applicant_id, &mut tx).await?;

            ApplicantChange::record(
                number.id,
                &number.applicant_id,
                &new_applicant.employee_id,
                on,
                operator_id,
                remarks,
                &mut *tx,
            )
            .await?;

            number.applicant_id = new_applicant.employee_id;
            number.status = if number.current_holder_id.is_some() {
                NumberStatus::InUse
            } else {
                NumberStatus::Idle
            };
        }
        RiskAction::Reclaim => {
            release_holder(&mut number, on, &mut tx).await?;
            number.status = NumberStatus::Idle;
        }
        RiskAction::Deactivate => {
            release_holder(&mut number, on, &mut tx).await?;
            number.status = NumberStatus::Deactivated;
            number.cancellation_date = Some(on);
        }
    }

    if let Some(remarks) = remarks {
        number.append_remarks(remarks);
    }

    let number = number.save(&mut *tx).await?;
    tx.commit().await?;

    info!(
        phone = %number.phone,
        action = ?input.action,
        operator = %operator_id,
        status = ?number.status,
        "risk handled"
    );
    Ok(number)
}

/// Flag every live, non-deactivated number applied for by a departed
/// employee. Runs inside the caller's transaction.
pub async fn flag_risk_for_applicant<'e>(
    applicant_id: &EmployeeId,
    executor: impl PgExecutor<'e>,
) -> ServiceResult<u64> {
    let flagged = MobileNumber::flag_risk_for_applicant(applicant_id, executor).await?;
    info!(applicant = %applicant_id, flagged, "numbers flagged for risk review");
    Ok(flagged)
}
