use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_list_env, parse_u64_env, parse_usize_env};
use crate::reply::ReplySettings;
use crate::sessions::SessionSettings;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a patient, encouraging tutor helping a student learn Alteryx. Answer the student's question clearly and concisely, use short examples when they help, and ask a clarifying question when the request is ambiguous.";
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Sorry, I couldn't reach the tutor just now. Please try asking again in a moment.";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MODEL_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_HISTORY_MAX_TURNS: usize = 40;
const DEFAULT_SESSION_IDLE_TTL_SECONDS: u64 = 3600;
const DEFAULT_SESSION_PURGE_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Gemini,
    OpenRouter,
    Echo,
}

impl LlmProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
            Self::Echo => "echo",
        }
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            "echo" => Ok(Self::Echo),
            other => Err(ConfigError::InvalidConfiguration(format!(
                "LLM_PROVIDER must be one of gemini, openrouter, echo (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub llm_provider: LlmProviderKind,
    pub system_prompt: String,
    pub fallback_reply: String,
    pub model_timeout_ms: u64,
    /// 0 keeps every turn.
    pub history_max_turns: usize,
    /// 0 renders the whole transcript into each prompt.
    pub prompt_window_turns: usize,
    pub session_idle_ttl_seconds: u64,
    pub session_purge_interval_seconds: u64,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
}

/// Loads `.env` from the working directory or its parents. A missing file is not an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_provider = match optional_trimmed_env("LLM_PROVIDER") {
            Some(raw) => LlmProviderKind::parse(&raw)?,
            None => LlmProviderKind::Gemini,
        };

        let model_timeout_ms = parse_u64_env("CHAT_MODEL_TIMEOUT_MS", DEFAULT_MODEL_TIMEOUT_MS)?;
        if model_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "CHAT_MODEL_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        let session_idle_ttl_seconds = parse_u64_env(
            "SESSION_IDLE_TTL_SECONDS",
            DEFAULT_SESSION_IDLE_TTL_SECONDS,
        )?;
        if session_idle_ttl_seconds == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "SESSION_IDLE_TTL_SECONDS must be greater than zero".to_string(),
            ));
        }

        let session_purge_interval_seconds = parse_u64_env(
            "SESSION_PURGE_INTERVAL_SECONDS",
            DEFAULT_SESSION_PURGE_INTERVAL_SECONDS,
        )?;
        if session_purge_interval_seconds == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "SESSION_PURGE_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: optional_trimmed_env("API_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            llm_provider,
            system_prompt: load_system_prompt()?,
            fallback_reply: optional_trimmed_env("CHAT_FALLBACK_REPLY")
                .unwrap_or_else(|| DEFAULT_FALLBACK_REPLY.to_string()),
            model_timeout_ms,
            history_max_turns: parse_usize_env(
                "CHAT_HISTORY_MAX_TURNS",
                DEFAULT_HISTORY_MAX_TURNS,
            )?,
            prompt_window_turns: parse_usize_env("CHAT_PROMPT_WINDOW_TURNS", 0)?,
            session_idle_ttl_seconds,
            session_purge_interval_seconds,
            cors_allowed_origins: parse_list_env("CORS_ALLOWED_ORIGINS", &["*"]),
        })
    }

    pub fn reply_settings(&self) -> ReplySettings {
        ReplySettings {
            system_prompt: self.system_prompt.clone(),
            fallback_reply: self.fallback_reply.clone(),
            model_timeout: Duration::from_millis(self.model_timeout_ms),
            prompt_window_turns: non_zero(self.prompt_window_turns),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_ttl: Duration::from_secs(self.session_idle_ttl_seconds),
            max_turns: non_zero(self.history_max_turns),
        }
    }

    pub fn session_purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_interval_seconds)
    }
}

fn load_system_prompt() -> Result<String, ConfigError> {
    let inline = optional_trimmed_env("CHAT_SYSTEM_PROMPT");
    let file = optional_trimmed_env("CHAT_SYSTEM_PROMPT_FILE").map(PathBuf::from);

    match (inline, file) {
        (Some(_), Some(_)) => Err(ConfigError::InvalidConfiguration(
            "set only one of CHAT_SYSTEM_PROMPT or CHAT_SYSTEM_PROMPT_FILE".to_string(),
        )),
        (Some(prompt), None) => Ok(prompt),
        (None, Some(path)) => fs::read_to_string(&path)
            .map(|prompt| prompt.trim().to_string())
            .map_err(|err| {
                ConfigError::InvalidConfiguration(format!(
                    "CHAT_SYSTEM_PROMPT_FILE {} could not be read: {err}",
                    path.display()
                ))
            }),
        (None, None) => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}

fn non_zero(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "API_BIND_ADDR",
        "LLM_PROVIDER",
        "CHAT_SYSTEM_PROMPT",
        "CHAT_SYSTEM_PROMPT_FILE",
        "CHAT_FALLBACK_REPLY",
        "CHAT_MODEL_TIMEOUT_MS",
        "CHAT_HISTORY_MAX_TURNS",
        "CHAT_PROMPT_WINDOW_TURNS",
        "SESSION_IDLE_TTL_SECONDS",
        "SESSION_PURGE_INTERVAL_SECONDS",
        "CORS_ALLOWED_ORIGINS",
    ];

    fn clear_env() {
        for key in KEYS {
            // SAFETY: env-mutating tests are serialized with `#[serial]`.
            unsafe { std::env::remove_var(key) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env-mutating tests are serialized with `#[serial]`.
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    #[serial]
    fn defaults_apply_when_env_is_empty() {
        clear_env();

        let config = ApiConfig::from_env().expect("defaults should load");
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.llm_provider, LlmProviderKind::Gemini);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.fallback_reply, DEFAULT_FALLBACK_REPLY);
        assert_eq!(config.cors_allowed_origins, vec!["*".to_string()]);

        let sessions = config.session_settings();
        assert_eq!(sessions.max_turns, Some(DEFAULT_HISTORY_MAX_TURNS));
        assert_eq!(sessions.idle_ttl, Duration::from_secs(3600));
        assert_eq!(config.reply_settings().prompt_window_turns, None);
    }

    #[test]
    #[serial]
    fn zero_history_limit_means_unbounded() {
        clear_env();
        set_env("CHAT_HISTORY_MAX_TURNS", "0");
        set_env("CHAT_PROMPT_WINDOW_TURNS", "6");

        let config = ApiConfig::from_env().expect("config should load");
        assert_eq!(config.session_settings().max_turns, None);
        assert_eq!(config.reply_settings().prompt_window_turns, Some(6));
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_unknown_provider_and_bad_integers() {
        clear_env();
        set_env("LLM_PROVIDER", "mystery");
        assert!(matches!(
            ApiConfig::from_env(),
            Err(ConfigError::InvalidConfiguration(_))
        ));

        clear_env();
        set_env("CHAT_MODEL_TIMEOUT_MS", "soon");
        assert!(matches!(
            ApiConfig::from_env(),
            Err(ConfigError::ParseInt(key)) if key == "CHAT_MODEL_TIMEOUT_MS"
        ));

        clear_env();
        set_env("CHAT_MODEL_TIMEOUT_MS", "0");
        assert!(matches!(
            ApiConfig::from_env(),
            Err(ConfigError::InvalidConfiguration(_))
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_zero_session_lifetimes() {
        clear_env();
        set_env("SESSION_IDLE_TTL_SECONDS", "0");
        assert!(matches!(
            ApiConfig::from_env(),
            Err(ConfigError::InvalidConfiguration(message)) if message.contains("SESSION_IDLE_TTL_SECONDS")
        ));

        clear_env();
        set_env("SESSION_PURGE_INTERVAL_SECONDS", "0");
        assert!(matches!(
            ApiConfig::from_env(),
            Err(ConfigError::InvalidConfiguration(message)) if message.contains("SESSION_PURGE_INTERVAL_SECONDS")
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn system_prompt_loads_from_file() {
        clear_env();
        let path = std::env::temp_dir().join(format!(
            "tutor-system-prompt-{}.txt",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "  You are a SQL tutor.\n").expect("prompt file should write");
        set_env(
            "CHAT_SYSTEM_PROMPT_FILE",
            path.to_str().expect("temp path should be utf-8"),
        );

        let config = ApiConfig::from_env().expect("config should load");
        assert_eq!(config.system_prompt, "You are a SQL tutor.");

        set_env("CHAT_SYSTEM_PROMPT", "inline persona");
        assert!(matches!(
            ApiConfig::from_env(),
            Err(ConfigError::InvalidConfiguration(_))
        ));

        let _ = std::fs::remove_file(path);
        clear_env();
    }

    #[test]
    #[serial]
    fn cors_origins_parse_as_csv() {
        clear_env();
        set_env(
            "CORS_ALLOWED_ORIGINS",
            "http://localhost:3000, https://tutor.example.com ,",
        );

        let config = ApiConfig::from_env().expect("config should load");
        assert_eq!(
            config.cors_allowed_origins,
            vec![
                "http://localhost:3000".to_string(),
                "https://tutor.example.com".to_string()
            ]
        );
        clear_env();
    }
}
