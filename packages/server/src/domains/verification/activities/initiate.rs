use serde::Deserialize;
use tracing::info;

use crate::common::{EmployeeId, ServiceError, ServiceResult, VerificationBatchId};
use crate::domains::employees::{Employee, EmployeeScope};
use crate::domains::verification::models::{ScopeKind, VerificationBatchTask};
use crate::kernel::ServerDeps;

pub const MAX_TOKEN_LIFETIME_DAYS: i32 = 90;
const DEFAULT_BATCH_LIST_LIMIT: i64 = 20;
const MAX_BATCH_LIST_LIMIT: i64 = 200;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateVerificationInput {
    pub scope: ScopeKind,
    #[serde(default)]
    pub scope_values: Vec<String>,
    /// Token lifetime in days.
    pub duration_days: i32,
}

/// Turn a requested scope into an employee query. Values are trimmed,
/// blanks dropped and duplicates removed.
pub fn resolve_scope(kind: ScopeKind, values: &[String]) -> ServiceResult<EmployeeScope> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !cleaned.iter().any(|seen| seen == value) {
            cleaned.push(value.to_string());
        }
    }

    match kind {
        ScopeKind::All => Ok(EmployeeScope::All),
        ScopeKind::ByDepartment if cleaned.is_empty() => Err(ServiceError::validation(
            "at least one department name is required",
        )),
        ScopeKind::ByDepartment => Ok(EmployeeScope::Departments(cleaned)),
        ScopeKind::ByEmployeeIds if cleaned.is_empty() => Err(ServiceError::validation(
            "at least one employee id is required",
        )),
        ScopeKind::ByEmployeeIds => Ok(EmployeeScope::Ids(
            cleaned.into_iter().map(EmployeeId::new).collect(),
        )),
    }
}

/// Resolve the scope, persist a pending batch task and hand it to the
/// runner. Returns without waiting for any token or email.
pub async fn initiate_verification(
    input: InitiateVerificationInput,
    deps: &ServerDeps,
) -> ServiceResult<VerificationBatchTask> {
    if !(1..=MAX_TOKEN_LIFETIME_DAYS).contains(&input.duration_days) {
        return Err(ServiceError::validation(format!(
            "durationDays must be between 1 and {}",
            MAX_TOKEN_LIFETIME_DAYS
        )));
    }

    let scope = resolve_scope(input.scope, &input.scope_values)?;
    let employees = Employee::find_active_by_scope(&scope, &deps.db_pool).await?;

    if employees.is_empty() {
        return Err(ServiceError::validation(
            "no active employees match the requested scope",
        ));
    }

    let employee_ids: Vec<EmployeeId> = employees.into_iter().map(|e| e.employee_id).collect();
    let scope_values = match &scope {
        EmployeeScope::All => Vec::new(),
        EmployeeScope::Departments(names) => names.clone(),
        EmployeeScope::Ids(ids) => ids.iter().map(|id| id.as_str().to_string()).collect(),
    };

    let task = VerificationBatchTask::create(
        input.scope,
        &scope_values,
        &employee_ids,
        input.duration_days,
        &deps.db_pool,
    )
    .await?;

    deps.batch_wakeup.notify_one();

    info!(
        batch_id = %task.id,
        scope = ?task.scope,
        total = task.total_to_process,
        lifetime_days = task.token_lifetime_days,
        "verification batch queued"
    );
    Ok(task)
}

pub async fn get_batch_status(
    batch_id: VerificationBatchId,
    deps: &ServerDeps,
) -> ServiceResult<VerificationBatchTask> {
    VerificationBatchTask::find_by_id(batch_id, &deps.db_pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("verification batch {}", batch_id)))
}

/// Most recent batches first.
pub async fn list_batches(
    limit: Option<i64>,
    deps: &ServerDeps,
) -> ServiceResult<Vec<VerificationBatchTask>> {
    let limit = limit
        .unwrap_or(DEFAULT_BATCH_LIST_LIMIT)
        .clamp(1, MAX_BATCH_LIST_LIMIT);
    Ok(VerificationBatchTask::list_recent(limit, &deps.db_pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_all_ignores_values() {
        assert_eq!(
            resolve_scope(ScopeKind::All, &values(&["ignored"])).unwrap(),
            EmployeeScope::All
        );
    }

    #[test]
    fn test_department_scope_cleans_values() {
        let scope =
            resolve_scope(ScopeKind::ByDepartment, &values(&[" Sales ", "", "Sales", "Ops"]))
                .unwrap();
        assert_eq!(
            scope,
            EmployeeScope::Departments(values(&["Sales", "Ops"]))
        );
    }

    #[test]
    fn test_empty_values_rejected() {
        for kind in [ScopeKind::ByDepartment, ScopeKind::ByEmployeeIds] {
            let err = resolve_scope(kind, &values(&["  "])).unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
    }

    #[test]
    fn test_employee_id_scope() {
        let scope = resolve_scope(ScopeKind::ByEmployeeIds, &values(&["E2", "E1", "E2"])).unwrap();
        assert_eq!(
            scope,
            EmployeeScope::Ids(vec![EmployeeId::new("E2"), EmployeeId::new("E1")])
        );
    }
}
