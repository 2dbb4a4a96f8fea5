//! `/mobilenumbers` endpoints.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};

use crate::common::{Page, ServiceResult};
use crate::domains::numbers::activities::{
    assign_number, create_number, delete_number, get_number, handle_risk, list_numbers,
    number_history, unassign_number, update_number, AssignNumberInput, CreateNumberInput,
    HandleRiskInput, ListNumbersQuery, NumberHistory, UnassignNumberInput, UpdateNumberInput,
};
use crate::domains::numbers::MobileNumber;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

pub async fn create_number_handler(
    Extension(state): Extension<AppState>,
    Json(input): Json<CreateNumberInput>,
) -> ServiceResult<(StatusCode, Json<MobileNumber>)> {
    let number = create_number(input, &state.deps).await?;
    Ok((StatusCode::CREATED, Json(number)))
}

pub async fn list_numbers_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListNumbersQuery>,
) -> ServiceResult<Json<Page<MobileNumber>>> {
    Ok(Json(list_numbers(query, &state.deps).await?))
}

pub async fn get_number_handler(
    Extension(state): Extension<AppState>,
    Path(phone): Path<String>,
) -> ServiceResult<Json<MobileNumber>> {
    Ok(Json(get_number(&phone, &state.deps).await?))
}

pub async fn update_number_handler(
    Extension(state): Extension<AppState>,
    Path(phone): Path<String>,
    Json(patch): Json<UpdateNumberInput>,
) -> ServiceResult<Json<MobileNumber>> {
    Ok(Json(update_number(&phone, patch, &state.deps).await?))
}

pub async fn delete_number_handler(
    Extension(state): Extension<AppState>,
    Path(phone): Path<String>,
) -> ServiceResult<StatusCode> {
    delete_number(&phone, &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn number_history_handler(
    Extension(state): Extension<AppState>,
    Path(phone): Path<String>,
) -> ServiceResult<Json<NumberHistory>> {
    Ok(Json(number_history(&phone, &state.deps).await?))
}

pub async fn assign_number_handler(
    Extension(state): Extension<AppState>,
    Path(phone): Path<String>,
    Json(input): Json<AssignNumberInput>,
) -> ServiceResult<Json<MobileNumber>> {
    Ok(Json(assign_number(&phone, input, &state.deps).await?))
}

/// The body is optional; without one the number is reclaimed today.
pub async fn unassign_number_handler(
    Extension(state): Extension<AppState>,
    Path(phone): Path<String>,
    input: Option<Json<UnassignNumberInput>>,
) -> ServiceResult<Json<MobileNumber>> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    Ok(Json(unassign_number(&phone, input, &state.deps).await?))
}

pub async fn handle_risk_handler(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(phone): Path<String>,
    Json(input): Json<HandleRiskInput>,
) -> ServiceResult<Json<MobileNumber>> {
    Ok(Json(
        handle_risk(&phone, input, &user.employee_id, &state.deps).await?,
    ))
}
