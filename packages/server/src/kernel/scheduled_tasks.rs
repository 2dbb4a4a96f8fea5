//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Runs independently of the batch runner:
//! - Hourly sweep marking stale verification tokens `expired`
//! - Hourly purge of revocations whose credential has already expired
//!
//! Token validity checks compare against `expires_at` directly, so nothing
//! depends on the sweep having run; it keeps the stored status honest for
//! reporting.

use anyhow::Result;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::auth::revocation::{PostgresRevocationStore, TokenRevocationStore};
use crate::domains::verification::activities::expire_stale_tokens;

/// Start all scheduled tasks
pub async fn start_scheduler(pool: PgPool) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Token sweep - runs at the top of every hour
    let sweep_pool = pool.clone();
    let sweep_job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let pool = sweep_pool.clone();
        Box::pin(async move {
            if let Err(e) = run_token_sweep(&pool).await {
                tracing::error!("Token sweep task failed: {}", e);
            }
        })
    })?;

    scheduler.add(sweep_job).await?;

    // Revocation purge - runs every hour at half past
    let purge_pool = pool.clone();
    let purge_job = Job::new_async("0 30 * * * *", move |_uuid, _lock| {
        let pool = purge_pool.clone();
        Box::pin(async move {
            if let Err(e) = run_revocation_purge(&pool).await {
                tracing::error!("Revocation purge task failed: {}", e);
            }
        })
    })?;

    scheduler.add(purge_job).await?;
    scheduler.start().await?;

    tracing::info!("Scheduled tasks started (token sweep and revocation purge, hourly)");
    Ok(scheduler)
}

async fn run_token_sweep(pool: &PgPool) -> Result<()> {
    let expired = expire_stale_tokens(pool).await?;
    if expired > 0 {
        tracing::info!(expired, "Marked stale verification tokens as expired");
    } else {
        tracing::debug!("No stale verification tokens");
    }
    Ok(())
}

async fn run_revocation_purge(pool: &PgPool) -> Result<()> {
    let store = PostgresRevocationStore::new(pool.clone());
    let purged = store.purge_expired().await?;
    tracing::debug!(purged, "Purged expired token revocations");
    Ok(())
}
