//! `/verification` endpoints.
//!
//! `info` and `submit` are public and authenticated by the campaign token
//! in the query string; everything else needs an operator JWT.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::common::{ReportedIssueId, ServiceResult, VerificationBatchId};
use crate::domains::verification::activities::{
    get_batch_status, get_info, get_status, initiate_verification, list_batches, resolve_issue,
    submit, InitiateVerificationInput, ResolveIssueInput, StatusFilter, SubmissionReceipt,
    SubmitVerificationInput, VerificationInfo, VerificationStatusReport,
};
use crate::domains::verification::models::{BatchStatus, ReportedIssue, VerificationBatchTask};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ListBatchesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub batch_id: VerificationBatchId,
    pub status: BatchStatus,
    pub total_to_process: i32,
}

pub async fn initiate_handler(
    Extension(state): Extension<AppState>,
    Json(input): Json<InitiateVerificationInput>,
) -> ServiceResult<(StatusCode, Json<InitiateResponse>)> {
    let task = initiate_verification(input, &state.deps).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(InitiateResponse {
            batch_id: task.id,
            status: task.status,
            total_to_process: task.total_to_process,
        }),
    ))
}

pub async fn batch_status_handler(
    Extension(state): Extension<AppState>,
    Path(batch_id): Path<VerificationBatchId>,
) -> ServiceResult<Json<VerificationBatchTask>> {
    Ok(Json(get_batch_status(batch_id, &state.deps).await?))
}

pub async fn list_batches_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListBatchesQuery>,
) -> ServiceResult<Json<Vec<VerificationBatchTask>>> {
    Ok(Json(list_batches(query.limit, &state.deps).await?))
}

pub async fn info_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<TokenQuery>,
) -> ServiceResult<Json<VerificationInfo>> {
    Ok(Json(get_info(&query.token, &state.deps).await?))
}

pub async fn submit_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<TokenQuery>,
    Json(input): Json<SubmitVerificationInput>,
) -> ServiceResult<Json<SubmissionReceipt>> {
    Ok(Json(submit(&query.token, input, &state.deps).await?))
}

pub async fn admin_status_handler(
    Extension(state): Extension<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ServiceResult<Json<VerificationStatusReport>> {
    Ok(Json(get_status(filter, &state.deps).await?))
}

pub async fn resolve_issue_handler(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(issue_id): Path<ReportedIssueId>,
    Json(input): Json<ResolveIssueInput>,
) -> ServiceResult<Json<ReportedIssue>> {
    Ok(Json(
        resolve_issue(issue_id, input, &user.employee_id, &state.deps).await?,
    ))
}
