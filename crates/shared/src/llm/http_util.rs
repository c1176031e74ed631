use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::gateway::LlmGatewayError;

pub(crate) fn transport_error(err: &reqwest::Error) -> LlmGatewayError {
    if err.is_timeout() {
        LlmGatewayError::Timeout
    } else {
        LlmGatewayError::ProviderFailure("request_unavailable".to_string())
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> LlmGatewayError {
    LlmGatewayError::ProviderFailure(format!(
        "status={} code={}",
        status.as_u16(),
        parse_provider_error_code(body)
    ))
}

pub(crate) fn header_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// Both OpenRouter and Google wrap failures as `{"error": {"code": ..., "status"?: ...}}`.
pub(crate) fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
        status: Option<String>,
    }

    let Some(details) = serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
    else {
        return "unknown".to_string();
    };

    if let Some(status) = details.status.filter(|status| !status.is_empty()) {
        return status;
    }

    match details.code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

pub(crate) fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
