use std::sync::Arc;

use crate::config::LlmProviderKind;

pub mod echo;
pub mod gateway;
pub mod gemini;
mod http_util;
pub mod observability;
pub mod openrouter;

pub use echo::EchoGateway;
pub use gateway::{
    GatewayConfigError, LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayResponse,
    LlmTokenUsage,
};
pub use gemini::{GeminiGateway, GeminiGatewayConfig};
pub use observability::{
    LlmExecutionSource, LlmTelemetryEvent, generate_with_telemetry, log_telemetry,
};
pub use openrouter::{OpenRouterGateway, OpenRouterGatewayConfig};

/// Builds the configured provider, reading its credentials from the environment.
pub fn gateway_from_env(kind: LlmProviderKind) -> Result<Arc<dyn LlmGateway>, GatewayConfigError> {
    let gateway: Arc<dyn LlmGateway> = match kind {
        LlmProviderKind::Gemini => Arc::new(GeminiGateway::new(GeminiGatewayConfig::from_env()?)?),
        LlmProviderKind::OpenRouter => Arc::new(OpenRouterGateway::new(
            OpenRouterGatewayConfig::from_env()?,
        )?),
        LlmProviderKind::Echo => Arc::new(EchoGateway),
    };

    Ok(gateway)
}
