use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{EmployeeId, MobileNumberId, ReportedIssueId, VerificationTokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reported_issue_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NumberIssue,
    UnlistedNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_review_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportedIssue {
    pub id: ReportedIssueId,
    pub token_id: Option<VerificationTokenId>,
    pub employee_id: EmployeeId,
    pub mobile_number_id: Option<MobileNumberId>,
    pub reported_phone_number: Option<String>,
    pub issue_kind: IssueKind,
    pub comment: Option<String>,
    pub purpose: Option<String>,
    pub review_status: ReviewStatus,
    pub admin_remarks: Option<String>,
    pub reviewed_by: Option<EmployeeId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportedIssue {
    /// Open or refresh the pending issue for (employee, number).
    ///
    /// A repeat report updates the pending row in place; empty fields keep
    /// what was reported before.
    pub async fn upsert_number_issue<'e>(
        token_id: VerificationTokenId,
        employee_id: &EmployeeId,
        mobile_number_id: MobileNumberId,
        comment: Option<&str>,
        purpose: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO user_reported_issues
                (id, token_id, employee_id, mobile_number_id, issue_kind, comment, purpose)
            VALUES ($1, $2, $3, $4, 'number_issue', $5, $6)
            ON CONFLICT (employee_id, mobile_number_id)
                WHERE review_status = 'pending' AND mobile_number_id IS NOT NULL
            DO UPDATE SET
                token_id = EXCLUDED.token_id,
                comment = COALESCE(EXCLUDED.comment, user_reported_issues.comment),
                purpose = COALESCE(EXCLUDED.purpose, user_reported_issues.purpose),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(ReportedIssueId::new())
        .bind(token_id)
        .bind(employee_id)
        .bind(mobile_number_id)
        .bind(comment)
        .bind(purpose)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Open or refresh the pending unlisted-number report for
    /// (employee, phone).
    pub async fn upsert_unlisted<'e>(
        token_id: VerificationTokenId,
        employee_id: &EmployeeId,
        phone: &str,
        comment: Option<&str>,
        purpose: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO user_reported_issues
                (id, token_id, employee_id, reported_phone_number, issue_kind, comment, purpose)
            VALUES ($1, $2, $3, $4, 'unlisted_number', $5, $6)
            ON CONFLICT (employee_id, reported_phone_number)
                WHERE review_status = 'pending' AND reported_phone_number IS NOT NULL
            DO UPDATE SET
                token_id = EXCLUDED.token_id,
                comment = COALESCE(EXCLUDED.comment, user_reported_issues.comment),
                purpose = COALESCE(EXCLUDED.purpose, user_reported_issues.purpose),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(ReportedIssueId::new())
        .bind(token_id)
        .bind(employee_id)
        .bind(phone)
        .bind(comment)
        .bind(purpose)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn lock_by_id<'e>(
        id: ReportedIssueId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM user_reported_issues WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn close<'e>(
        id: ReportedIssueId,
        status: ReviewStatus,
        admin_remarks: Option<&str>,
        reviewed_by: &EmployeeId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE user_reported_issues
            SET review_status = $2,
                admin_remarks = $3,
                reviewed_by = $4,
                reviewed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(admin_remarks)
        .bind(reviewed_by)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Unlisted numbers reported under one token, oldest first.
    pub async fn unlisted_for_token<'e>(
        token_id: VerificationTokenId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM user_reported_issues
            WHERE token_id = $1 AND issue_kind = 'unlisted_number'
            ORDER BY created_at
            "#,
        )
        .bind(token_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
