use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::domains::verification::models::{QueueDepth, VerificationBatchTask};
use crate::server::app::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: Check,
    /// Omitted when the database is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_queue: Option<QueueDepth>,
}

#[derive(Serialize)]
pub struct Check {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Liveness plus verification-batch backlog.
///
/// 503 when the database does not answer within 5s. Stalled batches are
/// reported but do not fail the check; the runner reclaims them.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let depth = tokio::time::timeout(
        CHECK_TIMEOUT,
        VerificationBatchTask::queue_depth(&state.db_pool),
    )
    .await;

    let (database, batch_queue) = match depth {
        Ok(Ok(depth)) => {
            if depth.stalled > 0 {
                warn!(stalled = depth.stalled, "verification batches waiting to be reclaimed");
            }
            (Check { ok: true, error: None }, Some(depth))
        }
        Ok(Err(e)) => (
            Check {
                ok: false,
                error: Some(format!("query failed: {}", e)),
            },
            None,
        ),
        Err(_) => (
            Check {
                ok: false,
                error: Some(format!("no answer within {:?}", CHECK_TIMEOUT)),
            },
            None,
        ),
    };

    let status_code = if database.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if database.ok { "healthy" } else { "unhealthy" },
            database,
            batch_queue,
        }),
    )
}
