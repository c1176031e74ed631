use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::ReplyService;

mod chat;
mod cors;
mod errors;
mod health;
mod observability;

pub use cors::CorsPolicy;

#[derive(Clone)]
pub struct AppState {
    pub reply_service: ReplyService,
    pub provider: &'static str,
    pub cors: CorsPolicy,
}

pub fn build_router(app_state: AppState) -> Router {
    let cors_state = app_state.cors.clone();

    Router::new()
        .route("/", get(health::status))
        .route("/healthz", get(health::healthz))
        .route("/chat", post(chat::post_chat))
        .route(
            "/chat/sessions/{session_id}",
            get(chat::get_session).delete(chat::delete_session),
        )
        .with_state(app_state)
        .layer(middleware::from_fn_with_state(
            cors_state,
            cors::cors_middleware,
        ))
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
}
