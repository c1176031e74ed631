use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::{LlmGateway, LlmGatewayError, LlmGatewayResponse};
use crate::prompt::PromptRequest;

#[derive(Debug, Clone, Copy)]
pub enum LlmExecutionSource {
    ChatReply,
}

impl LlmExecutionSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatReply => "chat_reply",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmTelemetryEvent {
    pub source: &'static str,
    pub provider: &'static str,
    pub outcome: &'static str,
    pub latency_ms: u64,
    pub model: Option<String>,
    pub history_turns: usize,
    pub prompt_chars: usize,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub error_type: Option<&'static str>,
}

/// Runs one model call bounded by `timeout`. An elapsed timeout is reported as
/// [`LlmGatewayError::Timeout`].
pub async fn generate_with_telemetry(
    llm_gateway: &dyn LlmGateway,
    source: LlmExecutionSource,
    request: &PromptRequest,
    timeout: Duration,
) -> (
    Result<LlmGatewayResponse, LlmGatewayError>,
    LlmTelemetryEvent,
) {
    let started_at = Instant::now();
    let result = match tokio::time::timeout(timeout, llm_gateway.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmGatewayError::Timeout),
    };
    let telemetry = telemetry_for_result(
        source,
        llm_gateway.provider(),
        request,
        started_at.elapsed(),
        &result,
    );
    (result, telemetry)
}

pub fn log_telemetry(session_id: &str, telemetry: &LlmTelemetryEvent) {
    match telemetry.error_type {
        None => info!(
            session_id,
            source = telemetry.source,
            provider = telemetry.provider,
            outcome = telemetry.outcome,
            latency_ms = telemetry.latency_ms,
            model = telemetry.model.as_deref().unwrap_or("unknown"),
            history_turns = telemetry.history_turns,
            prompt_chars = telemetry.prompt_chars,
            prompt_tokens = telemetry.prompt_tokens,
            completion_tokens = telemetry.completion_tokens,
            total_tokens = telemetry.total_tokens,
            metric_name = "llm_request",
            "llm request completed"
        ),
        Some(error_type) => warn!(
            session_id,
            source = telemetry.source,
            provider = telemetry.provider,
            outcome = telemetry.outcome,
            latency_ms = telemetry.latency_ms,
            history_turns = telemetry.history_turns,
            prompt_chars = telemetry.prompt_chars,
            error_type,
            metric_name = "llm_request",
            "llm request failed"
        ),
    }
}

fn telemetry_for_result(
    source: LlmExecutionSource,
    provider: &'static str,
    request: &PromptRequest,
    latency: Duration,
    result: &Result<LlmGatewayResponse, LlmGatewayError>,
) -> LlmTelemetryEvent {
    let base = LlmTelemetryEvent {
        source: source.as_str(),
        provider,
        outcome: "success",
        latency_ms: duration_to_millis(latency),
        model: None,
        history_turns: request.history().len(),
        prompt_chars: request.text().chars().count(),
        prompt_tokens: None,
        completion_tokens: None,
        total_tokens: None,
        error_type: None,
    };

    match result {
        Ok(response) => {
            let usage = response.usage.as_ref();
            LlmTelemetryEvent {
                model: Some(response.model.clone()),
                prompt_tokens: usage.map(|usage| usage.prompt_tokens),
                completion_tokens: usage.map(|usage| usage.completion_tokens),
                total_tokens: usage.map(|usage| usage.total_tokens),
                ..base
            }
        }
        Err(err) => LlmTelemetryEvent {
            outcome: if matches!(err, LlmGatewayError::Timeout) {
                "timeout"
            } else {
                "failure"
            },
            error_type: Some(err.kind()),
            ..base
        },
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
