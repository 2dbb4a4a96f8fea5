//! Bearer-token revocation.
//!
//! A revoked token stays listed until its own expiry; after that the JWT
//! check rejects it anyway and the row can be purged.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[async_trait]
pub trait TokenRevocationStore: Send + Sync {
    /// Revoke the token with id `jti`. Revoking twice is a no-op.
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()>;

    async fn is_revoked(&self, jti: &str) -> Result<bool>;

    /// Drop revocations for tokens that have expired. Returns rows removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Revocations persisted in `revoked_tokens`, shared by every instance on
/// the same database.
#[derive(Clone)]
pub struct PostgresRevocationStore {
    pool: PgPool,
}

impl PostgresRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRevocationStore for PostgresRevocationStore {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
