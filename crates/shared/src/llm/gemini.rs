use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::gateway::{
    GatewayConfigError, LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayResponse,
    LlmTokenUsage,
};
use super::http_util::{clamp_u64_to_u32, header_request_id, status_error, transport_error};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u64_env, require_env};
use crate::prompt::PromptRequest;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_TEMPERATURE: f32 = 0.4;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl GeminiGatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = match optional_trimmed_env("GEMINI_API_KEY") {
            Some(api_key) => api_key,
            None => require_env("GOOGLE_API_KEY")
                .map_err(|_| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?,
        };

        let base_url = optional_trimmed_env("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidConfiguration(
                "GEMINI_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: optional_trimmed_env("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_ms: parse_u64_env("GEMINI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    fn generate_content_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Google Generative Language `generateContent`. The rendered prompt string goes out as a
/// single user content part.
#[derive(Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GeminiGatewayConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiGatewayConfig) -> Result<Self, GatewayConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GatewayConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn send_once(
        &self,
        request: &PromptRequest,
    ) -> Result<LlmGatewayResponse, LlmGatewayError> {
        let request_body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": request.text() }]
                }
            ],
            "generationConfig": {
                "temperature": self.config.temperature
            }
        });

        let response = self
            .client
            .post(self.config.generate_content_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;

        let status = response.status();
        let header_request_id = header_request_id(response.headers());
        let body = response.text().await.map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("response_body_read_failed".to_string())
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        let Some(candidate) = parsed.candidates.first() else {
            let reason = parsed
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .map(|reason| format!("prompt_blocked:{reason}"))
                .unwrap_or_else(|| "missing_candidate".to_string());
            return Err(LlmGatewayError::InvalidProviderPayload(reason));
        };

        let text = candidate
            .content
            .as_ref()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            let reason = candidate
                .finish_reason
                .as_deref()
                .map(|reason| format!("empty_content:{reason}"))
                .unwrap_or_else(|| "empty_content".to_string());
            return Err(LlmGatewayError::InvalidProviderPayload(reason));
        }

        Ok(LlmGatewayResponse {
            model: parsed
                .model_version
                .unwrap_or_else(|| self.config.model.clone()),
            provider_request_id: header_request_id.or(parsed.response_id),
            text,
            usage: parsed.usage_metadata.map(|usage| LlmTokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_token_count.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.candidates_token_count.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_token_count.unwrap_or(0)),
            }),
        })
    }
}

impl LlmGateway for GeminiGateway {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn generate<'a>(&'a self, request: &'a PromptRequest) -> LlmGatewayFuture<'a> {
        Box::pin(self.send_once(request))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}
