//! Reply orchestration for one inbound chat message.
//!
//! A request moves through `received → user turn appended → prompt rendered → model dispatched`
//! and then either `assistant turn appended → completed` or `model failed → fallback returned`.
//! A failed model call leaves only the user turn in the transcript.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{DEFAULT_FALLBACK_REPLY, DEFAULT_SYSTEM_PROMPT};
use crate::llm::{LlmExecutionSource, LlmGateway, generate_with_telemetry, log_telemetry};
use crate::prompt::{HistoryWindow, render_with_window};
use crate::sessions::{SessionId, SessionStore};
use crate::transcript::{Transcript, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySettings {
    pub system_prompt: String,
    pub fallback_reply: String,
    pub model_timeout: Duration,
    pub prompt_window_turns: Option<usize>,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            model_timeout: Duration::from_secs(20),
            prompt_window_turns: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("message must not be empty")]
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Completed,
    FallbackReturned { error_type: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub outcome: ReplyOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub session_id: SessionId,
    pub text: String,
    pub outcome: ReplyOutcome,
}

#[derive(Clone)]
pub struct ReplyService {
    gateway: Arc<dyn LlmGateway>,
    sessions: SessionStore,
    settings: Arc<ReplySettings>,
}

impl ReplyService {
    pub fn new(gateway: Arc<dyn LlmGateway>, sessions: SessionStore, settings: ReplySettings) -> Self {
        let mut settings = settings;
        if settings.fallback_reply.trim().is_empty() {
            settings.fallback_reply = DEFAULT_FALLBACK_REPLY.to_string();
        }

        Self {
            gateway,
            sessions,
            settings: Arc::new(settings),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn settings(&self) -> &ReplySettings {
        &self.settings
    }

    /// Replies within the session named by `session_id`, opening a new session when it is
    /// `None` or unknown. Calls on the same session run one at a time.
    pub async fn handle(
        &self,
        session_id: Option<SessionId>,
        user_text: &str,
    ) -> Result<Reply, ReplyError> {
        let user_turn = Turn::user(user_text).map_err(|_| ReplyError::InvalidInput)?;

        let (session_id, session) = self.sessions.open(session_id);
        let mut transcript = session.lock().await;
        let reply = self
            .reply_with_turn(&mut transcript, user_turn, &session_id.to_string())
            .await;
        drop(transcript);
        self.sessions.touch(session_id);

        Ok(Reply {
            session_id,
            text: reply.text,
            outcome: reply.outcome,
        })
    }

    /// Same flow as [`ReplyService::handle`] against a caller-owned transcript.
    pub async fn respond(
        &self,
        transcript: &mut Transcript,
        user_text: &str,
    ) -> Result<TurnReply, ReplyError> {
        let user_turn = Turn::user(user_text).map_err(|_| ReplyError::InvalidInput)?;
        Ok(self.reply_with_turn(transcript, user_turn, "detached").await)
    }

    async fn reply_with_turn(
        &self,
        transcript: &mut Transcript,
        user_turn: Turn,
        session_label: &str,
    ) -> TurnReply {
        let prior_turns = transcript.snapshot();
        let user_text = user_turn.text().to_string();
        transcript.append(user_turn);

        let window = HistoryWindow {
            max_turns: self.settings.prompt_window_turns,
        };
        let prompt = render_with_window(
            &prior_turns,
            &user_text,
            &self.settings.system_prompt,
            window,
        );

        let (llm_result, telemetry) = generate_with_telemetry(
            self.gateway.as_ref(),
            LlmExecutionSource::ChatReply,
            &prompt,
            self.settings.model_timeout,
        )
        .await;
        log_telemetry(session_label, &telemetry);

        let error_type = match llm_result {
            Ok(response) => match Turn::assistant(&response.text) {
                Ok(assistant_turn) => {
                    let text = assistant_turn.text().to_string();
                    transcript.append(assistant_turn);
                    debug!(
                        session_id = session_label,
                        transcript_turns = transcript.len(),
                        "assistant reply recorded"
                    );
                    return TurnReply {
                        text,
                        outcome: ReplyOutcome::Completed,
                    };
                }
                Err(_) => {
                    warn!(
                        session_id = session_label,
                        model = %response.model,
                        "llm provider returned a blank reply; returning fallback"
                    );
                    "blank_reply"
                }
            },
            Err(err) => {
                warn!(
                    session_id = session_label,
                    error = %err,
                    "llm provider request failed; returning fallback"
                );
                err.kind()
            }
        };

        TurnReply {
            text: self.settings.fallback_reply.clone(),
            outcome: ReplyOutcome::FallbackReturned { error_type },
        }
    }
}
