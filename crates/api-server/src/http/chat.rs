use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{ChatRequest, ChatResponse, OkResponse, SessionTranscriptResponse};
use shared::{ReplyError, ReplyOutcome, SessionId};
use tracing::{info, warn};

use super::AppState;
use super::errors::{bad_request_response, not_found_response};
use super::observability::RequestContext;

pub(super) async fn post_chat(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                request_id = %context.request_id,
                rejection = %rejection.body_text(),
                "chat request body rejected"
            );
            return bad_request_response(
                "invalid_request",
                "Body must be JSON with a string `message` field",
            );
        }
    };

    match state
        .reply_service
        .handle(req.session_id, &req.message)
        .await
    {
        Ok(reply) => {
            let outcome = match reply.outcome {
                ReplyOutcome::Completed => "completed",
                ReplyOutcome::FallbackReturned { .. } => "fallback",
            };
            info!(
                request_id = %context.request_id,
                session_id = %reply.session_id,
                outcome,
                "chat reply sent"
            );

            (
                StatusCode::OK,
                Json(ChatResponse {
                    reply: reply.text,
                    session_id: reply.session_id,
                }),
            )
                .into_response()
        }
        Err(ReplyError::InvalidInput) => {
            bad_request_response("invalid_input", "Message must not be empty")
        }
    }
}

pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session_id) = parse_session_id(&session_id) else {
        return bad_request_response("invalid_session_id", "Session id must be a UUID");
    };

    let Some(session) = state.reply_service.sessions().get(session_id) else {
        return not_found_response("Session not found");
    };
    let turns = session.lock().await.snapshot();

    (
        StatusCode::OK,
        Json(SessionTranscriptResponse { session_id, turns }),
    )
        .into_response()
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session_id) = parse_session_id(&session_id) else {
        return bad_request_response("invalid_session_id", "Session id must be a UUID");
    };

    if !state.reply_service.sessions().remove(session_id) {
        return not_found_response("Session not found");
    }

    info!(session_id = %session_id, "chat session deleted");
    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}

fn parse_session_id(raw: &str) -> Option<SessionId> {
    SessionId::parse_str(raw.trim()).ok()
}
