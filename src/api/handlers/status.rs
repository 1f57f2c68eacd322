use crate::AppState;
use crate::api::middleware::metrics::StatusReport;
use axum::{Json, extract::State};

#[utoipa::path(
    get,
    path = "/.status",
    responses(
        (status = 200, description = "Request statistics", body = StatusReport),
        (status = 401, description = "Missing or wrong Basic credentials")
    ),
    security(
        ("basic" = [])
    ),
    tag = "system"
)]
pub async fn get_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.stats.report())
}
