use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{EmployeeId, TokenRejection, VerificationBatchId, VerificationTokenId};

/// Random bytes per token before encoding.
pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_token_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Pending,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VerificationToken {
    pub id: VerificationTokenId,
    pub batch_id: VerificationBatchId,
    pub employee_id: EmployeeId,
    #[serde(skip_serializing)]
    pub token: String,
    pub status: TokenStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub dispatch_recorded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fresh URL-safe token string (43 characters).
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl VerificationToken {
    /// A token is usable while pending and not past its expiry, whether or
    /// not the sweep has caught up.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), TokenRejection> {
        if self.status != TokenStatus::Pending || now > self.expires_at {
            return Err(TokenRejection::Expired);
        }
        Ok(())
    }

    pub async fn insert<'e>(
        batch_id: VerificationBatchId,
        employee_id: &EmployeeId,
        token: &str,
        expires_at: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO verification_tokens (id, batch_id, employee_id, token, status, expires_at)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING *
            "#,
        )
        .bind(VerificationTokenId::new())
        .bind(batch_id)
        .bind(employee_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_token<'e>(
        token: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM verification_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Tokens already issued for this batch, from earlier runs included.
    pub async fn find_by_batch<'e>(
        batch_id: VerificationBatchId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM verification_tokens WHERE batch_id = $1 ORDER BY created_at",
        )
        .bind(batch_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Note that this token's email outcome has been counted. Returns false
    /// if it already was.
    pub async fn mark_dispatch_recorded<'e>(
        id: VerificationTokenId,
        executor: impl PgExecutor<'e>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE verification_tokens
            SET dispatch_recorded_at = NOW()
            WHERE id = $1 AND dispatch_recorded_at IS NULL
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn expire_stale<'e>(executor: impl PgExecutor<'e>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE verification_tokens SET status = 'expired' WHERE status = 'pending' AND expires_at < NOW()",
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
