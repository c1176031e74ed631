use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::llm::{LlmGateway, LlmGatewayError, OpenRouterGateway, OpenRouterGatewayConfig};
use shared::{Turn, render};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_payloads: Arc<Mutex<Vec<Value>>>,
    seen_auth_headers: Arc<Mutex<Vec<String>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_payloads: Arc::new(Mutex::new(Vec::new())),
            seen_auth_headers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn sends_role_tagged_history_and_parses_reply() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: success_response_body("provider-model", json!("Alteryx is a data analytics platform.")),
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = OpenRouterGateway::new(config_for(url)).expect("gateway should build");
    let history = vec![
        Turn::user("Hi").expect("turn should build"),
        Turn::assistant("Hello").expect("turn should build"),
    ];
    let prompt = render(&history, "What is Alteryx?", "You are a tutor.");
    let response = gateway
        .generate(&prompt)
        .await
        .expect("request should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(response.text, "Alteryx is a data analytics platform.");
    assert_eq!(response.model, "provider-model");
    assert_eq!(response.provider_request_id.as_deref(), Some("req-success"));
    assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(20));

    let seen_payloads = state.seen_payloads.lock().await.clone();
    assert_eq!(seen_payloads.len(), 1);
    assert_eq!(seen_payloads[0]["model"], "test-model");
    assert_eq!(
        seen_payloads[0]["messages"],
        json!([
            { "role": "system", "content": "You are a tutor." },
            { "role": "user", "content": "Hi" },
            { "role": "assistant", "content": "Hello" },
            { "role": "user", "content": "What is Alteryx?" }
        ])
    );

    let seen_auth_headers = state.seen_auth_headers.lock().await.clone();
    assert_eq!(
        seen_auth_headers,
        vec!["Bearer test-openrouter-key".to_string()]
    );
}

#[tokio::test]
async fn makes_a_single_attempt_on_transient_failure() {
    let state = TestServerState::with_replies(vec![
        provider_error_reply(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
        MockReply {
            status: StatusCode::OK,
            body: success_response_body("provider-model", json!("should not be reached")),
        },
    ]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = OpenRouterGateway::new(config_for(url)).expect("gateway should build");
    let err = gateway
        .generate(&render(&[], "Hi", ""))
        .await
        .expect_err("transient failure should surface");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(
        matches!(err, LlmGatewayError::ProviderFailure(ref message) if message == "status=503 code=overloaded"),
        "expected structured provider error, got {err:?}"
    );
    assert_eq!(state.seen_payloads.lock().await.len(), 1);
}

#[tokio::test]
async fn unauthorized_maps_to_provider_failure() {
    let state = TestServerState::with_replies(vec![provider_error_reply(
        StatusCode::UNAUTHORIZED,
        "invalid_api_key",
    )]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = OpenRouterGateway::new(config_for(url)).expect("gateway should build");
    let err = gateway
        .generate(&render(&[], "Hi", ""))
        .await
        .expect_err("unauthorized errors should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(
        matches!(err, LlmGatewayError::ProviderFailure(ref message) if message.contains("status=401")),
        "expected unauthorized provider error, got {err:?}"
    );
}

#[tokio::test]
async fn blank_content_is_an_invalid_payload() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: success_response_body("provider-model", json!("   ")),
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = OpenRouterGateway::new(config_for(url)).expect("gateway should build");
    let err = gateway
        .generate(&render(&[], "Hi", ""))
        .await
        .expect_err("blank content should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(matches!(err, LlmGatewayError::InvalidProviderPayload(ref reason) if reason == "empty_content"));
}

#[tokio::test]
async fn joins_multipart_content() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: success_response_body(
            "provider-model",
            json!([
                { "type": "text", "text": "Filters split " },
                { "type": "text", "text": "rows into True and False." }
            ]),
        ),
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = OpenRouterGateway::new(config_for(url)).expect("gateway should build");
    let response = gateway
        .generate(&render(&[], "What does Filter do?", ""))
        .await
        .expect("multipart content should parse");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(response.text, "Filters split rows into True and False.");
}

fn config_for(chat_completions_url: String) -> OpenRouterGatewayConfig {
    OpenRouterGatewayConfig {
        chat_completions_url,
        api_key: "test-openrouter-key".to_string(),
        model: "test-model".to_string(),
        timeout_ms: 5_000,
        temperature: 0.0,
    }
}

fn success_response_body(model: &str, content: Value) -> Value {
    json!({
        "id": "req-success",
        "model": model,
        "choices": [
            {
                "message": {
                    "content": content
                }
            }
        ],
        "usage": {
            "prompt_tokens": 12,
            "completion_tokens": 8,
            "total_tokens": 20
        }
    })
}

fn provider_error_reply(status: StatusCode, code: &str) -> MockReply {
    MockReply {
        status,
        body: json!({
            "error": {
                "code": code
            }
        }),
    }
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/chat/completions", post(test_chat_completions_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (
        format!("http://{local_addr}/chat/completions"),
        shutdown_tx,
        server_task,
    )
}

async fn test_chat_completions_handler(
    State(state): State<TestServerState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen_payloads.lock().await.push(payload);

    if let Some(value) = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
    {
        state.seen_auth_headers.lock().await.push(value.to_string());
    }

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({
            "error": {
                "code": "exhausted_test_replies"
            }
        }),
    });

    (reply.status, Json(reply.body))
}
