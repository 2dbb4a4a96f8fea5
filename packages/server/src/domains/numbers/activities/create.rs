use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::common::{
    clean_text, is_unique_violation, normalize_phone, EmployeeId, ServiceError, ServiceResult,
};
use crate::domains::employees::Employee;
use crate::domains::numbers::models::{MobileNumber, NewMobileNumber};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNumberInput {
    pub phone: String,
    pub applicant_id: EmployeeId,
    pub application_date: Option<NaiveDate>,
    pub purpose: Option<String>,
    pub vendor: Option<String>,
    pub remarks: Option<String>,
}

/// Register a new company number. It starts `idle` with no holder.
pub async fn create_number(
    input: CreateNumberInput,
    deps: &ServerDeps,
) -> ServiceResult<MobileNumber> {
    let pool = &deps.db_pool;
    let phone = normalize_phone(&input.phone)?;

    if Employee::find_by_id(&input.applicant_id, pool).await?.is_none() {
        return Err(ServiceError::not_found(format!(
            "applicant {}",
            input.applicant_id
        )));
    }

    if MobileNumber::phone_taken(&phone, pool).await? {
        return Err(duplicate(&phone));
    }

    let new_number = NewMobileNumber::builder()
        .phone(phone.as_str())
        .applicant_id(&input.applicant_id)
        .application_date(input.application_date)
        .purpose(clean_text(input.purpose))
        .vendor(clean_text(input.vendor))
        .remarks(clean_text(input.remarks))
        .build();

    // A concurrent create of the same phone loses on the unique index.
    let number = match MobileNumber::insert(new_number, pool).await {
        Ok(number) => number,
        Err(e)
            if e
                .downcast_ref::<sqlx::Error>()
                .is_some_and(is_unique_violation) =>
        {
            return Err(duplicate(&phone));
        }
        Err(e) => return Err(e.into()),
    };

    info!(number_id = %number.id, phone = %number.phone, applicant = %number.applicant_id, "number created");
    Ok(number)
}

fn duplicate(phone: &str) -> ServiceError {
    ServiceError::Conflict(format!("phone number {} is already registered", phone))
}
