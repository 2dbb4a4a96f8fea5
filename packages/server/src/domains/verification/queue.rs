//! The batch task table as a `TaskQueue`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::domains::verification::models::VerificationBatchTask;
use crate::kernel::jobs::{ClaimedTask, TaskQueue};

pub struct BatchTaskQueue {
    pool: PgPool,
}

impl BatchTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskQueue for BatchTaskQueue {
    async fn claim(&self, worker_id: &str, limit: i64, lease: Duration) -> Result<Vec<ClaimedTask>> {
        let tasks = VerificationBatchTask::claim(worker_id, limit, lease, &self.pool).await?;
        Ok(tasks
            .into_iter()
            .map(|task| ClaimedTask {
                id: task.id.into_uuid(),
                worker_id: worker_id.to_string(),
                lease,
                attempt: task.attempts,
            })
            .collect())
    }

    async fn abandon_exhausted(&self, max_attempts: i32) -> Result<u64> {
        VerificationBatchTask::abandon_exhausted(max_attempts, &self.pool).await
    }
}
