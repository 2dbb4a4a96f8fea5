//! Employment status changes pushed by the HR collaborator.

use serde::Serialize;
use tracing::info;

use crate::common::{today, EmployeeId, ServiceError, ServiceResult};
use crate::domains::employees::models::{Employee, EmploymentStatus};
use crate::domains::numbers::activities::flag_risk_for_applicant;
use crate::kernel::ServerDeps;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeOutcome {
    pub employee: Employee,
    /// Numbers moved to `risk_pending` because their applicant departed.
    pub flagged_numbers: u64,
}

/// Record a status change; a departure flags the employee's applied-for
/// numbers in the same transaction.
pub async fn on_status_changed(
    employee_id: &EmployeeId,
    new_status: EmploymentStatus,
    deps: &ServerDeps,
) -> ServiceResult<StatusChangeOutcome> {
    let mut tx = deps.db_pool.begin().await?;

    let employee = Employee::update_status(employee_id, new_status, today(), &mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("employee {}", employee_id)))?;

    let flagged_numbers = match new_status {
        EmploymentStatus::Departed => flag_risk_for_applicant(employee_id, &mut *tx).await?,
        EmploymentStatus::Active => 0,
    };

    tx.commit().await?;

    info!(
        employee_id = %employee_id,
        status = ?new_status,
        flagged_numbers,
        "employee status changed"
    );

    Ok(StatusChangeOutcome {
        employee,
        flagged_numbers,
    })
}
