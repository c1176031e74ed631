#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_server::http::{AppState, CorsPolicy, build_router};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use shared::llm::{LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayResponse};
use shared::{PromptRequest, ReplyService, ReplySettings, SessionSettings, SessionStore};
use tower::ServiceExt;

pub const TEST_FALLBACK_REPLY: &str = "The tutor is taking a short break. Please try again.";

/// Answers every prompt with `"{prefix} #{n}"` and keeps the rendered prompts it saw.
#[derive(Clone, Default)]
pub struct NumberedGateway {
    prefix: &'static str,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl NumberedGateway {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log lock").clone()
    }
}

impl LlmGateway for NumberedGateway {
    fn provider(&self) -> &'static str {
        "numbered"
    }

    fn generate<'a>(&'a self, request: &'a PromptRequest) -> LlmGatewayFuture<'a> {
        let count = {
            let mut prompts = self.prompts.lock().expect("prompt log lock");
            prompts.push(request.text().to_string());
            prompts.len()
        };

        Box::pin(async move {
            Ok(LlmGatewayResponse {
                model: "numbered-model".to_string(),
                provider_request_id: Some(format!("req-{count}")),
                text: format!("{} #{count}", self.prefix),
                usage: None,
            })
        })
    }
}

#[derive(Clone, Copy, Default)]
pub struct FailingGateway;

impl LlmGateway for FailingGateway {
    fn provider(&self) -> &'static str {
        "failing"
    }

    fn generate<'a>(&'a self, _request: &'a PromptRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async {
            Err(LlmGatewayError::ProviderFailure(
                "status=503 code=UNAVAILABLE".to_string(),
            ))
        })
    }
}

pub fn test_reply_settings() -> ReplySettings {
    ReplySettings {
        system_prompt: String::new(),
        fallback_reply: TEST_FALLBACK_REPLY.to_string(),
        model_timeout: Duration::from_secs(5),
        prompt_window_turns: None,
    }
}

pub fn build_test_router(gateway: Arc<dyn LlmGateway>) -> Router {
    build_test_router_with(gateway, test_reply_settings(), CorsPolicy::allow_any())
}

pub fn build_test_router_with(
    gateway: Arc<dyn LlmGateway>,
    settings: ReplySettings,
    cors: CorsPolicy,
) -> Router {
    let provider = gateway.provider();
    let sessions = SessionStore::new(SessionSettings {
        idle_ttl: Duration::from_secs(3600),
        max_turns: Some(40),
    });

    build_router(AppState {
        reply_service: ReplyService::new(gateway, sessions, settings),
        provider,
        cors,
    })
}

pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request should build"))
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response should be JSON")
    };

    (status, value)
}

pub async fn post_chat(app: &Router, body: Value) -> (StatusCode, Value) {
    send_json(app, Method::POST, "/chat", Some(body)).await
}
