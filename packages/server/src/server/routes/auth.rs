use axum::{extract::Extension, http::StatusCode};
use tracing::info;

use crate::common::ServiceResult;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

/// Revoke the bearer token that authenticated this request.
pub async fn logout_handler(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ServiceResult<StatusCode> {
    state
        .revocations
        .revoke(&user.token_id, user.expires_at)
        .await?;
    info!(employee_id = %user.employee_id, "operator logged out");
    Ok(StatusCode::NO_CONTENT)
}
