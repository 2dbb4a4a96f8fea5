use anyhow::Result;
use sqlx::PgPool;

use crate::domains::verification::models::VerificationToken;

/// Mark pending tokens past their expiry as `expired`.
pub async fn expire_stale_tokens(pool: &PgPool) -> Result<u64> {
    VerificationToken::expire_stale(pool).await
}
