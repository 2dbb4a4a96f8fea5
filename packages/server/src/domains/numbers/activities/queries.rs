use serde::{Deserialize, Serialize};

use crate::common::{EmployeeId, Page, PageRequest, ServiceError, ServiceResult};
use crate::domains::numbers::models::{
    ApplicantChange, MobileNumber, NumberFilter, NumberSortField, NumberStatus, SortOrder,
    UsageRecord,
};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNumbersQuery {
    pub status: Option<NumberStatus>,
    pub holder_id: Option<EmployeeId>,
    pub applicant_id: Option<EmployeeId>,
    pub phone_contains: Option<String>,
    #[serde(default)]
    pub sort: NumberSortField,
    #[serde(default)]
    pub order: SortOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberHistory {
    pub number: MobileNumber,
    pub usage: Vec<UsageRecord>,
    pub applicant_changes: Vec<ApplicantChange>,
}

pub async fn get_number(phone: &str, deps: &ServerDeps) -> ServiceResult<MobileNumber> {
    let phone = phone.trim();
    MobileNumber::find_by_phone(phone, &deps.db_pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("number {}", phone)))
}

pub async fn list_numbers(
    query: ListNumbersQuery,
    deps: &ServerDeps,
) -> ServiceResult<Page<MobileNumber>> {
    let page = PageRequest {
        limit: query.limit,
        offset: query.offset,
    };
    let filter = NumberFilter {
        status: query.status,
        holder_id: query.holder_id,
        applicant_id: query.applicant_id,
        phone_contains: query.phone_contains,
    };
    let (items, total) =
        MobileNumber::list(&filter, query.sort, query.order, page, &deps.db_pool).await?;

    Ok(Page {
        items,
        total,
        limit: page.limit(),
        offset: page.offset(),
    })
}

/// Possession intervals and applicant changes, oldest first.
pub async fn number_history(phone: &str, deps: &ServerDeps) -> ServiceResult<NumberHistory> {
    let number = get_number(phone, deps).await?;
    let usage = UsageRecord::for_number(number.id, &deps.db_pool).await?;
    let applicant_changes = ApplicantChange::for_number(number.id, &deps.db_pool).await?;

    Ok(NumberHistory {
        number,
        usage,
        applicant_changes,
    })
}
