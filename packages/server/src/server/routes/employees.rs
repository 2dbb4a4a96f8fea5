use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;

use crate::common::{EmployeeId, ServiceResult};
use crate::domains::employees::activities::{on_status_changed, StatusChangeOutcome};
use crate::domains::employees::EmploymentStatus;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct EmployeeStatusBody {
    pub status: EmploymentStatus,
}

/// Status-changed hook called by the HR system.
pub async fn employee_status_handler(
    Extension(state): Extension<AppState>,
    Path(employee_id): Path<String>,
    Json(body): Json<EmployeeStatusBody>,
) -> ServiceResult<Json<StatusChangeOutcome>> {
    let employee_id = EmployeeId::new(employee_id);
    Ok(Json(
        on_status_changed(&employee_id, body.status, &state.deps).await?,
    ))
}
