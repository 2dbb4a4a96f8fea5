use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{EmployeeId, VerificationBatchId};

/// Longest error summary kept on a task, in characters. Reasons past the
/// cap are dropped; the failure counters stay exact.
pub const ERROR_SUMMARY_LIMIT: i32 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_batch_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    InProgress,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithErrors | Self::Failed
        )
    }

    /// Final status of a run that processed every employee.
    pub fn on_completion(emails_failed: i32) -> Self {
        if emails_failed == 0 {
            Self::Completed
        } else {
            Self::CompletedWithErrors
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_scope", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum ScopeKind {
    All,
    #[serde(alias = "by_department")]
    ByDepartment,
    #[serde(alias = "by_employee_ids")]
    ByEmployeeIds,
}

/// Unfinished batches by state. `stalled` counts running batches whose
/// lease has lapsed and that are waiting to be reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QueueDepth {
    pub pending: i64,
    pub running: i64,
    pub stalled: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VerificationBatchTask {
    pub id: VerificationBatchId,
    pub status: BatchStatus,
    pub scope: ScopeKind,
    pub scope_values: Vec<String>,
    #[serde(skip_serializing)]
    pub employee_ids: Vec<String>,
    pub token_lifetime_days: i32,
    pub total_to_process: i32,
    pub tokens_generated: i32,
    pub emails_attempted: i32,
    pub emails_succeeded: i32,
    pub emails_failed: i32,
    pub error_summary: Option<String>,
    pub attempts: i32,
    #[serde(skip_serializing)]
    pub worker_id: Option<String>,
    #[serde(skip_serializing)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl VerificationBatchTask {
    pub fn resolved_employee_ids(&self) -> Vec<EmployeeId> {
        self.employee_ids.iter().map(EmployeeId::new).collect()
    }

    pub async fn create<'e>(
        scope: ScopeKind,
        scope_values: &[String],
        employee_ids: &[EmployeeId],
        token_lifetime_days: i32,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        let ids: Vec<String> = employee_ids.iter().map(|id| id.as_str().to_string()).collect();
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO verification_batch_tasks
                (id, status, scope, scope_values, employee_ids, token_lifetime_days, total_to_process)
            VALUES ($1, 'pending', $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(VerificationBatchId::new())
        .bind(scope)
        .bind(scope_values)
        .bind(&ids)
        .bind(token_lifetime_days)
        .bind(ids.len() as i32)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id<'e>(
        id: VerificationBatchId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM verification_batch_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn list_recent<'e>(limit: i64, executor: impl PgExecutor<'e>) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM verification_batch_tasks ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn queue_depth<'e>(executor: impl PgExecutor<'e>) -> Result<QueueDepth> {
        sqlx::query_as::<_, QueueDepth>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'in_progress' AND lease_expires_at >= NOW()) AS running,
                COUNT(*) FILTER (WHERE status = 'in_progress' AND lease_expires_at < NOW()) AS stalled
            FROM verification_batch_tasks
            WHERE status IN ('pending', 'in_progress')
            "#,
        )
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Claim runnable tasks: never started, or started by a runner whose
    /// lease has lapsed. Each claim counts as an attempt.
    pub async fn claim<'e>(
        worker_id: &str,
        limit: i64,
        lease: Duration,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE verification_batch_tasks t
            SET status = 'in_progress',
                started_at = COALESCE(t.started_at, NOW()),
                worker_id = $1,
                lease_expires_at = NOW() + make_interval(secs => $3),
                attempts = t.attempts + 1
            WHERE t.id IN (
                SELECT id FROM verification_batch_tasks
                WHERE status = 'pending'
                   OR (status = 'in_progress' AND lease_expires_at < NOW())
                ORDER BY created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING t.*
            "#,
        )
        .bind(worker_id)
        .bind(limit)
        .bind(lease.as_secs_f64())
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Fail tasks whose lease lapsed after `max_attempts` claims.
    pub async fn abandon_exhausted<'e>(
        max_attempts: i32,
        executor: impl PgExecutor<'e>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE verification_batch_tasks
            SET status = 'failed',
                finished_at = NOW(),
                worker_id = NULL,
                lease_expires_at = NULL,
                error_summary = CASE
                    WHEN length(COALESCE(error_summary, '')) + length($2) + 1 > $3 THEN error_summary
                    ELSE concat_ws(E'\n', error_summary, $2)
                END
            WHERE status = 'in_progress'
              AND lease_expires_at < NOW()
              AND attempts >= $1
            "#,
        )
        .bind(max_attempts)
        .bind(format!("abandoned after {} attempts", max_attempts))
        .bind(ERROR_SUMMARY_LIMIT)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Push the lease forward. Returns false if this worker no longer owns
    /// the task.
    pub async fn extend_lease<'e>(
        id: VerificationBatchId,
        worker_id: &str,
        lease: Duration,
        executor: impl PgExecutor<'e>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE verification_batch_tasks
            SET lease_expires_at = NOW() + make_interval(secs => $3)
            WHERE id = $1 AND worker_id = $2 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(lease.as_secs_f64())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn record_token_generated<'e>(
        id: VerificationBatchId,
        executor: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE verification_batch_tasks SET tokens_generated = tokens_generated + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Count one dispatch attempt. A failure may carry a reason for the
    /// error summary.
    pub async fn record_email_outcome<'e>(
        id: VerificationBatchId,
        succeeded: bool,
        reason: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE verification_batch_tasks
            SET emails_attempted = emails_attempted + 1,
                emails_succeeded = emails_succeeded + CASE WHEN $2 THEN 1 ELSE 0 END,
                emails_failed = emails_failed + CASE WHEN $2 THEN 0 ELSE 1 END,
                error_summary = CASE
                    WHEN $3::TEXT IS NULL THEN error_summary
                    WHEN length(COALESCE(error_summary, '')) + length($3) + 1 > $4 THEN error_summary
                    ELSE concat_ws(E'\n', error_summary, $3)
                END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(succeeded)
        .bind(reason)
        .bind(ERROR_SUMMARY_LIMIT)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Close a run that processed every employee. `status` comes from
    /// [`BatchStatus::on_completion`].
    pub async fn finish<'e>(
        id: VerificationBatchId,
        worker_id: &str,
        status: BatchStatus,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE verification_batch_tasks
            SET status = $3,
                finished_at = NOW(),
                worker_id = NULL,
                lease_expires_at = NULL
            WHERE id = $1 AND worker_id = $2 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(status)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_failed<'e>(
        id: VerificationBatchId,
        reason: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE verification_batch_tasks
            SET status = 'failed',
                finished_at = NOW(),
                worker_id = NULL,
                lease_expires_at = NULL,
                error_summary = CASE
                    WHEN length(COALESCE(error_summary, '')) + length($2) + 1 > $3 THEN error_summary
                    ELSE concat_ws(E'\n', error_summary, $2)
                END
            WHERE id = $1 AND status IN ('pending', 'in_progress')
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(ERROR_SUMMARY_LIMIT)
        .execute(executor)
        .await?;
        Ok(())
    }
}
