use super::gateway::{LlmGateway, LlmGatewayFuture, LlmGatewayResponse};
use crate::prompt::PromptRequest;

pub const ECHO_MODEL: &str = "echo";

/// Offline provider for local development: acknowledges the question without calling out.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGateway;

impl LlmGateway for EchoGateway {
    fn provider(&self) -> &'static str {
        "echo"
    }

    fn generate<'a>(&'a self, request: &'a PromptRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            Ok(LlmGatewayResponse {
                model: ECHO_MODEL.to_string(),
                provider_request_id: None,
                text: format!(
                    "I received your question: '{}'. Tutor reply coming soon.",
                    request.user_text()
                ),
                usage: None,
            })
        })
    }
}
