//! Server dependencies for domain activities (using traits for testability)
//!
//! This module provides the central dependency container passed to every
//! activity. External services sit behind trait objects so tests can swap
//! them for recording fakes.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::kernel::BaseEmailSender;

/// Server dependencies accessible to activities
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub email: Arc<dyn BaseEmailSender>,
    /// Base URL of the employee-facing verification page.
    pub verification_base_url: String,
    /// Upper bound on a single email dispatch; exceeding it counts as a failure.
    pub email_timeout: Duration,
    /// Wakes the batch runner as soon as a task is enqueued.
    pub batch_wakeup: Arc<Notify>,
}

impl ServerDeps {
    pub fn new(
        db_pool: PgPool,
        email: Arc<dyn BaseEmailSender>,
        verification_base_url: String,
        email_timeout: Duration,
    ) -> Self {
        Self {
            db_pool,
            email,
            verification_base_url,
            email_timeout,
            batch_wakeup: Arc::new(Notify::new()),
        }
    }

    /// Builds the link sent to an employee for one token.
    pub fn verification_link(&self, token: &str) -> String {
        let base = self.verification_base_url.trim_end_matches(&['?', '&'][..]);
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", base, separator, token)
    }
}
