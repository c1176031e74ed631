use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use shared::models::{OkResponse, ServiceStatusResponse};

use super::AppState;

const SERVICE_NAME: &str = "tutor-chat";

pub(super) async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse { ok: true }))
}

pub(super) async fn status(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ServiceStatusResponse {
            status: "running".to_string(),
            service: SERVICE_NAME.to_string(),
            provider: state.provider.to_string(),
        }),
    )
}
