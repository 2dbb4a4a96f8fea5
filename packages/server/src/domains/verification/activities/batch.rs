//! Background run of one verification batch.
//!
//! Employees are processed one at a time. Every counter update is its own
//! committed statement, so a status read mid-run sees live progress and a
//! crashed run can be resumed: employees that already hold a token for the
//! batch are skipped, and a token whose email outcome was never counted is
//! counted as a failed dispatch.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::common::{EmployeeId, VerificationBatchId};
use crate::domains::employees::Employee;
use crate::domains::verification::models::{
    generate_token_value, BatchStatus, VerificationBatchTask, VerificationToken,
};
use crate::kernel::jobs::{ClaimedTask, TaskHandler};
use crate::kernel::ServerDeps;

/// Runs claimed verification batches.
pub struct VerificationBatchHandler {
    deps: ServerDeps,
}

impl VerificationBatchHandler {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TaskHandler for VerificationBatchHandler {
    async fn run(&self, task: ClaimedTask) -> Result<()> {
        run_batch_task(&task, &self.deps).await
    }
}

/// Process every employee of a claimed batch, then close it.
///
/// Returns `Err` only for infrastructure failures or a lost lease; the
/// task then stays `in_progress` until another claim resumes it.
pub async fn run_batch_task(claimed: &ClaimedTask, deps: &ServerDeps) -> Result<()> {
    let pool = &deps.db_pool;
    let batch_id = VerificationBatchId::from_uuid(claimed.id);

    let Some(task) = VerificationBatchTask::find_by_id(batch_id, pool).await? else {
        warn!(batch_id = %batch_id, "claimed batch task disappeared");
        return Ok(());
    };

    info!(
        batch_id = %batch_id,
        attempt = claimed.attempt,
        total = task.total_to_process,
        "verification batch started"
    );

    let resolved = task.resolved_employee_ids();
    let employees = match Employee::find_by_ids(&resolved, pool).await {
        Ok(employees) => employees,
        Err(e) => {
            error!(batch_id = %batch_id, error = %e, "failed to load batch employees");
            VerificationBatchTask::mark_failed(
                batch_id,
                &format!("failed to load employees: {}", e),
                pool,
            )
            .await?;
            return Ok(());
        }
    };
    let by_id: HashMap<EmployeeId, Employee> = employees
        .into_iter()
        .map(|e| (e.employee_id.clone(), e))
        .collect();

    let already_issued = settle_earlier_tokens(batch_id, deps).await?;

    for employee_id in &resolved {
        if already_issued.contains(employee_id) {
            continue;
        }

        match by_id.get(employee_id) {
            Some(employee) => process_employee(&task, employee, deps).await?,
            None => {
                VerificationBatchTask::record_email_outcome(
                    batch_id,
                    false,
                    Some(&format!("{}: employee record not found", employee_id)),
                    pool,
                )
                .await?;
            }
        }

        if !VerificationBatchTask::extend_lease(batch_id, &claimed.worker_id, claimed.lease, pool)
            .await?
        {
            bail!("lease on verification batch {} was lost", batch_id);
        }
    }

    let emails_failed = VerificationBatchTask::find_by_id(batch_id, pool)
        .await?
        .map(|t| t.emails_failed)
        .unwrap_or_default();
    let final_status = BatchStatus::on_completion(emails_failed);

    match VerificationBatchTask::finish(batch_id, &claimed.worker_id, final_status, pool).await? {
        Some(done) => info!(
            batch_id = %batch_id,
            status = ?done.status,
            tokens_generated = done.tokens_generated,
            emails_succeeded = done.emails_succeeded,
            emails_failed = done.emails_failed,
            "verification batch finished"
        ),
        None => warn!(batch_id = %batch_id, "batch finished after its lease was lost"),
    }

    Ok(())
}

/// Employees that already hold a token for the batch from an earlier run.
///
/// A token whose email outcome was never counted belongs to a run that
/// stopped between issuing it and dispatching. Whether that email left is
/// unknown, so it is counted as failed rather than sent again.
async fn settle_earlier_tokens(
    batch_id: VerificationBatchId,
    deps: &ServerDeps,
) -> Result<HashSet<EmployeeId>> {
    let tokens = VerificationToken::find_by_batch(batch_id, &deps.db_pool).await?;
    if tokens.is_empty() {
        return Ok(HashSet::new());
    }

    let mut interrupted = 0usize;
    for token in tokens.iter().filter(|t| t.dispatch_recorded_at.is_none()) {
        let reason = format!("{}: run interrupted before dispatch", token.employee_id);
        if record_dispatch(batch_id, token, Some(&reason), deps).await? {
            interrupted += 1;
        }
    }

    info!(
        batch_id = %batch_id,
        skipped = tokens.len(),
        interrupted,
        "resuming batch; employees with tokens are skipped"
    );
    Ok(tokens.into_iter().map(|t| t.employee_id).collect())
}

/// Count a token's email outcome exactly once. Returns false if it was
/// already counted.
async fn record_dispatch(
    batch_id: VerificationBatchId,
    token: &VerificationToken,
    failure: Option<&str>,
    deps: &ServerDeps,
) -> Result<bool> {
    let mut tx = deps.db_pool.begin().await?;
    let first = VerificationToken::mark_dispatch_recorded(token.id, &mut *tx).await?;
    if first {
        VerificationBatchTask::record_email_outcome(batch_id, failure.is_none(), failure, &mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(first)
}

/// Issue one token and dispatch its email.
async fn process_employee(
    task: &VerificationBatchTask,
    employee: &Employee,
    deps: &ServerDeps,
) -> Result<()> {
    let pool = &deps.db_pool;
    let employee_id = &employee.employee_id;

    let token = match issue_token(task, employee_id, deps).await {
        Ok(token) => token,
        Err(e) => {
            warn!(batch_id = %task.id, employee_id = %employee_id, error = %e, "token issue failed");
            VerificationBatchTask::record_email_outcome(
                task.id,
                false,
                Some(&format!("{}: token could not be issued: {}", employee_id, e)),
                pool,
            )
            .await?;
            return Ok(());
        }
    };

    let Some(address) = employee.usable_email() else {
        let reason = format!("{}: no email address on file", employee_id);
        record_dispatch(task.id, &token, Some(&reason), deps).await?;
        return Ok(());
    };

    let link = deps.verification_link(&token.token);
    let sent = tokio::time::timeout(
        deps.email_timeout,
        deps.email
            .send_verification_email(address, &employee.name, &link),
    )
    .await;

    let failure = match sent {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{}: email failed: {}", employee_id, e)),
        Err(_) => Some(format!(
            "{}: email timed out after {:?}",
            employee_id, deps.email_timeout
        )),
    };

    match &failure {
        None => debug!(batch_id = %task.id, employee_id = %employee_id, "verification email sent"),
        Some(reason) => warn!(batch_id = %task.id, reason = %reason, "verification email failed"),
    }

    record_dispatch(task.id, &token, failure.as_deref(), deps).await?;
    Ok(())
}

/// Insert the token and count it in one transaction.
async fn issue_token(
    task: &VerificationBatchTask,
    employee_id: &EmployeeId,
    deps: &ServerDeps,
) -> Result<VerificationToken> {
    let expires_at = Utc::now() + Duration::days(i64::from(task.token_lifetime_days));

    let mut tx = deps.db_pool.begin().await?;
    let token = VerificationToken::insert(
        task.id,
        employee_id,
        &generate_token_value(),
        expires_at,
        &mut *tx,
    )
    .await?;
    VerificationBatchTask::record_token_generated(task.id, &mut *tx).await?;
    tx.commit().await?;

    Ok(token)
}
