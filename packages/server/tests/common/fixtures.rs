//! Test fixtures for creating test data.
//!
//! Employees go through the model directly; numbers and batches go through
//! the activities so fixtures obey the same rules as production callers.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use number_registry::common::{EmployeeId, VerificationBatchId};
use number_registry::domains::employees::models::UpsertEmployee;
use number_registry::domains::employees::Employee;
use number_registry::domains::numbers::activities::{
    assign_number, create_number, AssignNumberInput, CreateNumberInput,
};
use number_registry::domains::numbers::MobileNumber;
use number_registry::domains::verification::activities::{
    initiate_verification, run_batch_task, InitiateVerificationInput,
};
use number_registry::domains::verification::models::{ScopeKind, VerificationBatchTask};
use number_registry::domains::verification::BatchTaskQueue;
use number_registry::kernel::jobs::TaskQueue;
use number_registry::kernel::ServerDeps;
use sqlx::PgPool;
use uuid::Uuid;

/// Short random suffix for ids and department names.
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

/// A valid, practically unique company phone number.
pub fn unique_phone() -> String {
    format!("1{:010}", Uuid::new_v4().as_u128() % 10_000_000_000)
}

pub fn unique_department() -> String {
    format!("dept-{}", unique_suffix())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create an active employee with a `<id>@example.test` address.
pub async fn create_employee(pool: &PgPool, department: Option<&str>) -> Result<Employee> {
    let id = EmployeeId::new(format!("E{}", unique_suffix()));
    let email = format!("{}@example.test", id);
    create_employee_with_email(pool, &id, department, Some(&email)).await
}

pub async fn create_employee_with_email(
    pool: &PgPool,
    id: &EmployeeId,
    department: Option<&str>,
    email: Option<&str>,
) -> Result<Employee> {
    let name = format!("Employee {}", id);
    Employee::upsert(
        UpsertEmployee::builder()
            .employee_id(id)
            .name(name.as_str())
            .department(department)
            .email(email)
            .build(),
        pool,
    )
    .await
}

/// Register an idle number applied for by `applicant`.
pub async fn create_test_number(deps: &ServerDeps, applicant: &EmployeeId) -> Result<MobileNumber> {
    create_number(
        CreateNumberInput {
            phone: unique_phone(),
            applicant_id: applicant.clone(),
            application_date: Some(date(2025, 1, 1)),
            purpose: Some("field sales".to_string()),
            vendor: Some("Carrier A".to_string()),
            remarks: None,
        },
        deps,
    )
    .await
    .context("create_number failed")
}

/// Register a number and hand it to `holder`.
pub async fn create_held_number(
    deps: &ServerDeps,
    applicant: &EmployeeId,
    holder: &EmployeeId,
) -> Result<MobileNumber> {
    let number = create_test_number(deps, applicant).await?;
    assign_number(
        &number.phone,
        AssignNumberInput {
            employee_id: holder.clone(),
            date: Some(date(2025, 2, 1)),
            purpose: None,
        },
        deps,
    )
    .await
    .context("assign_number failed")
}

/// Start a campaign for the given employees.
pub async fn initiate_for(
    deps: &ServerDeps,
    employees: &[&EmployeeId],
    duration_days: i32,
) -> Result<VerificationBatchTask> {
    initiate_verification(
        InitiateVerificationInput {
            scope: ScopeKind::ByEmployeeIds,
            scope_values: employees.iter().map(|id| id.as_str().to_string()).collect(),
            duration_days,
        },
        deps,
    )
    .await
    .context("initiate_verification failed")
}

/// Drive queued batches until `batch_id` reaches a terminal status.
///
/// Other tests drain the same queue, so the batch may be run by a
/// different test; this only waits for it in that case.
pub async fn run_until_finished(
    deps: &ServerDeps,
    batch_id: VerificationBatchId,
) -> Result<VerificationBatchTask> {
    let queue = BatchTaskQueue::new(deps.db_pool.clone());
    let worker_id = format!("test-{}", unique_suffix());

    for _ in 0..200 {
        for task in queue.claim(&worker_id, 10, Duration::from_secs(60)).await? {
            run_batch_task(&task, deps).await?;
        }

        let task = VerificationBatchTask::find_by_id(batch_id, &deps.db_pool)
            .await?
            .context("batch task missing")?;
        if task.status.is_terminal() {
            return Ok(task);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    anyhow::bail!("batch {} did not finish", batch_id)
}

/// The token issued to `employee_id` by a batch.
pub async fn token_for(
    pool: &PgPool,
    batch_id: VerificationBatchId,
    employee_id: &EmployeeId,
) -> Result<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT token FROM verification_tokens WHERE batch_id = $1 AND employee_id = $2",
    )
    .bind(batch_id)
    .bind(employee_id)
    .fetch_one(pool)
    .await
    .context("token not found")
}

/// Run a one-employee campaign and return the issued token.
pub async fn issue_token(deps: &ServerDeps, employee_id: &EmployeeId) -> Result<String> {
    let batch = initiate_for(deps, &[employee_id], 14).await?;
    run_until_finished(deps, batch.id).await?;
    token_for(&deps.db_pool, batch.id, employee_id).await
}
