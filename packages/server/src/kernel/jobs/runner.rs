//! Bounded task runner for background batch work.
//!
//! The `TaskRunner` is a long-running service that:
//! - Polls its queue for runnable tasks (or wakes early when nudged)
//! - Runs at most `max_concurrent` tasks at once
//! - Leaves failed runs leased, so they are resumed once the lease lapses
//!
//! ```text
//! TaskRunner
//!     │
//!     ├─► abandon_exhausted()  (retry budget spent → terminal failure)
//!     ├─► claim(free permits)  (FOR UPDATE SKIP LOCKED + lease)
//!     └─► spawn handler.run(task) per claimed task, holding a permit
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::{ClaimedTask, TaskQueue};

/// Executes one claimed task to completion.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, task: ClaimedTask) -> Result<()>;
}

/// Configuration for the task runner.
#[derive(Debug, Clone)]
pub struct TaskRunnerConfig {
    pub max_concurrent: usize,
    /// How long to wait when no tasks are available
    pub poll_interval: Duration,
    pub lease: Duration,
    /// Lost leases tolerated before a task is abandoned
    pub max_attempts: i32,
    pub worker_id: String,
}

impl Default for TaskRunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            poll_interval: Duration::from_secs(5),
            lease: Duration::from_secs(300),
            max_attempts: 3,
            worker_id: format!("runner-{}", Uuid::new_v4()),
        }
    }
}

pub struct TaskRunner {
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    config: TaskRunnerConfig,
    permits: Arc<Semaphore>,
    wakeup: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
}

/// Handle used to stop a running `TaskRunner`.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wakeup.notify_one();
    }
}

impl TaskRunner {
    /// `wakeup` is shared with producers so an enqueue starts work immediately.
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        handler: Arc<dyn TaskHandler>,
        wakeup: Arc<Notify>,
        config: TaskRunnerConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            queue,
            handler,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            config: TaskRunnerConfig {
                max_concurrent,
                ..config
            },
            wakeup,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: self.shutdown.clone(),
            wakeup: self.wakeup.clone(),
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run until shutdown is requested.
    ///
    /// Tasks still running at shutdown keep their lease and are resumed by
    /// the next runner after it expires.
    pub async fn run(self) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "task runner starting"
        );

        while !self.is_shutdown_requested() {
            match self.queue.abandon_exhausted(self.config.max_attempts).await {
                Ok(0) => {}
                Ok(n) => warn!(count = n, "abandoned tasks after exhausting retries"),
                Err(e) => error!(error = %e, "failed to abandon exhausted tasks"),
            }

            let free = self.permits.available_permits();
            if free == 0 {
                self.idle().await;
                continue;
            }

            let claimed = match self
                .queue
                .claim(&self.config.worker_id, free as i64, self.config.lease)
                .await
            {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!(error = %e, "failed to claim tasks");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if claimed.is_empty() {
                self.idle().await;
                continue;
            }

            debug!(count = claimed.len(), "claimed tasks");

            for task in claimed {
                let permit = self
                    .permits
                    .clone()
                    .acquire_owned()
                    .await
                    .context("task semaphore closed")?;
                let handler = self.handler.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let task_id = task.id;
                    let attempt = task.attempt;
                    if let Err(e) = handler.run(task).await {
                        warn!(
                            task_id = %task_id,
                            attempt,
                            error = %e,
                            "task run aborted; it stays leased and will be resumed"
                        );
                    }
                });
            }
        }

        info!(worker_id = %self.config.worker_id, "task runner stopped");
        Ok(())
    }

    async fn idle(&self) {
        tokio::select! {
            _ = self.wakeup.notified() => {}
            _ = tokio::time::sleep(self.config.poll_interval) => {}
        }
    }
}
