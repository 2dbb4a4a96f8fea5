//! Task queue abstraction for background work.
//!
//! The queue is whatever table owns the work items; implementations claim
//! rows with `FOR UPDATE SKIP LOCKED` and a lease so a crashed runner's
//! work becomes claimable again once the lease lapses.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// A task claimed by one runner, valid until its lease expires.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub worker_id: String,
    pub lease: Duration,
    /// 1 for the first run, higher when resuming after a lost lease.
    pub attempt: i32,
}

impl ClaimedTask {
    pub fn is_resumed(&self) -> bool {
        self.attempt > 1
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Claim up to `limit` runnable tasks for `worker_id`.
    ///
    /// Runnable means never started, or started by a runner whose lease has
    /// expired.
    async fn claim(&self, worker_id: &str, limit: i64, lease: Duration) -> Result<Vec<ClaimedTask>>;

    /// Give up on tasks that lost their lease `max_attempts` times.
    ///
    /// Returns the number of tasks moved to a terminal failure state.
    async fn abandon_exhausted(&self, max_attempts: i32) -> Result<u64>;
}
