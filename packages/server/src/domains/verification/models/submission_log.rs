use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{EmployeeId, MobileNumberId, SubmissionLogId, VerificationTokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionAction {
    ConfirmUsage,
    ReportIssue,
    ReportUnlisted,
}

/// One employee action. Rows are insert-only (enforced by a trigger).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionLog {
    pub seq: i64,
    pub id: SubmissionLogId,
    pub employee_id: EmployeeId,
    pub token_id: VerificationTokenId,
    pub mobile_number_id: Option<MobileNumberId>,
    pub phone_number: String,
    pub action: SubmissionAction,
    pub purpose: Option<String>,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LatestAction {
    pub mobile_number_id: MobileNumberId,
    pub action: SubmissionAction,
}

impl SubmissionLog {
    #[allow(clippy::too_many_arguments)]
    pub async fn append<'e>(
        employee_id: &EmployeeId,
        token_id: VerificationTokenId,
        mobile_number_id: Option<MobileNumberId>,
        phone_number: &str,
        action: SubmissionAction,
        purpose: Option<&str>,
        comment: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO verification_submission_logs
                (id, employee_id, token_id, mobile_number_id, phone_number, action, purpose, comment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(SubmissionLogId::new())
        .bind(employee_id)
        .bind(token_id)
        .bind(mobile_number_id)
        .bind(phone_number)
        .bind(action)
        .bind(purpose)
        .bind(comment)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Latest action per number under one token. Ties on `submitted_at`
    /// (one transaction) go to the later insert.
    pub async fn latest_for_token<'e>(
        token_id: VerificationTokenId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<LatestAction>> {
        sqlx::query_as::<_, LatestAction>(
            r#"
            SELECT DISTINCT ON (mobile_number_id) mobile_number_id, action
            FROM verification_submission_logs
            WHERE token_id = $1 AND mobile_number_id IS NOT NULL
            ORDER BY mobile_number_id, submitted_at DESC, seq DESC
            "#,
        )
        .bind(token_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn for_token<'e>(
        token_id: VerificationTokenId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM verification_submission_logs WHERE token_id = $1 ORDER BY seq",
        )
        .bind(token_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
