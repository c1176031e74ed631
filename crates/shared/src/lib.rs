pub mod config;
mod config_env;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod reply;
pub mod sessions;
pub mod transcript;

pub use prompt::{HistoryWindow, PromptMessage, PromptRequest, PromptRole, render, render_with_window};
pub use reply::{Reply, ReplyError, ReplyOutcome, ReplyService, ReplySettings, TurnReply};
pub use sessions::{SessionHandle, SessionId, SessionSettings, SessionStore};
pub use transcript::{Speaker, Transcript, TranscriptError, Turn};
