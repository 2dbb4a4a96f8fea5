//! Assigning and reclaiming numbers.
//!
//! Every change runs in one transaction holding the number's row lock, and
//! keeps the holder column and the open usage interval in step.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::{error, info};

use crate::common::{clean_text, today, EmployeeId, ServiceError, ServiceResult};
use crate::domains::employees::activities::require_active_employee;
use crate::domains::numbers::models::{MobileNumber, NumberStatus, UsageRecord};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignNumberInput {
    pub employee_id: EmployeeId,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignNumberInput {
    /// Defaults to today.
    pub reclaim_date: Option<NaiveDate>,
}

pub async fn assign_number(
    phone: &str,
    input: AssignNumberInput,
    deps: &ServerDeps,
) -> ServiceResult<MobileNumber> {
    let mut tx = deps.db_pool.begin().await?;
    let mut number = lock_number(phone, &mut tx).await?;

    if number.status != NumberStatus::Idle {
        return Err(ServiceError::invalid_state(format!(
            "number {} is {:?}; only idle numbers can be assigned",
            number.phone, number.status
        )));
    }

    let employee = require_active_employee(&input.employee_id, &mut tx).await?;

    let started_on = input.date.unwrap_or_else(today);
    if let Some(purpose) = clean_text(input.purpose) {
        number.purpose = Some(purpose);
    }
    number.current_holder_id = Some(employee.employee_id.clone());
    number.status = NumberStatus::InUse;

    let number = number.save(&mut *tx).await?;
    UsageRecord::open(
        number.id,
        &employee.employee_id,
        number.purpose.as_deref(),
        started_on,
        &mut *tx,
    )
    .await?;

    tx.commit().await?;

    info!(phone = %number.phone, holder = %employee.employee_id, %started_on, "number assigned");
    Ok(number)
}

pub async fn unassign_number(
    phone: &str,
    input: UnassignNumberInput,
    deps: &ServerDeps,
) -> ServiceResult<MobileNumber> {
    let mut tx = deps.db_pool.begin().await?;
    let mut number = lock_number(phone, &mut tx).await?;

    if number.status != NumberStatus::InUse {
        return Err(ServiceError::invalid_state(format!(
            "number {} is {:?}; only in-use numbers can be unassigned",
            number.phone, number.status
        )));
    }

    let reclaim_date = input.reclaim_date.unwrap_or_else(today);
    let previous_holder = number.current_holder_id.clone();
    release_holder(&mut number, reclaim_date, &mut tx).await?;
    number.status = NumberStatus::Idle;

    let number = number.save(&mut *tx).await?;
    tx.commit().await?;

    info!(
        phone = %number.phone,
        previous_holder = ?previous_holder,
        %reclaim_date,
        "number unassigned"
    );
    Ok(number)
}

/// Load a live number and lock its row for the rest of the transaction.
pub(crate) async fn lock_number(
    phone: &str,
    conn: &mut PgConnection,
) -> ServiceResult<MobileNumber> {
    let phone = phone.trim();
    MobileNumber::lock_by_phone(phone, &mut *conn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("number {}", phone)))
}

/// Close the holder's open usage interval on `on` and clear the holder.
///
/// A number without a holder is left untouched. A holder without an open
/// interval is a broken invariant and aborts the transaction.
pub(crate) async fn release_holder(
    number: &mut MobileNumber,
    on: NaiveDate,
    conn: &mut PgConnection,
) -> ServiceResult<()> {
    let Some(holder) = number.current_holder_id.clone() else {
        return Ok(());
    };

    let open = match UsageRecord::find_open(number.id, &holder, &mut *conn).await? {
        Some(open) => open,
        None => {
            error!(
                phone = %number.phone,
                holder = %holder,
                "held number has no open usage interval"
            );
            return Err(ServiceError::DataInconsistency(format!(
                "number {} is held by {} but has no open usage record",
                number.phone, holder
            )));
        }
    };

    if on < open.started_on {
        return Err(ServiceError::validation(format!(
            "reclaim date {} is before the usage start {}",
            on, open.started_on
        )));
    }

    UsageRecord::close(open.id, on, &mut *conn).await?;
    number.current_holder_id = None;
    Ok(())
}
