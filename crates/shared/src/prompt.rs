//! Prompt assembly from a transcript snapshot.
//!
//! The single-string form is the system prompt (when non-blank), then one `"<speaker>: <text>"`
//! line per prior turn, then the new user text, joined with `\n`:
//!
//! ```text
//! You are a tutor.
//! user: Hi
//! assistant: Hello
//! What is Alteryx?
//! ```
//!
//! Providers that take role-tagged messages use [`PromptRequest::messages`] instead, which carries
//! the same content in the same order.

use serde::Serialize;

use crate::transcript::{Speaker, Turn};

pub const PROMPT_LINE_SEPARATOR: &str = "\n";

/// Render-time limit on how many prior turns reach the model. The transcript is untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    pub max_turns: Option<usize>,
}

impl HistoryWindow {
    pub const fn unbounded() -> Self {
        Self { max_turns: None }
    }

    pub const fn last(max_turns: usize) -> Self {
        Self {
            max_turns: Some(max_turns),
        }
    }

    fn apply<'a>(&self, history: &'a [Turn]) -> &'a [Turn] {
        match self.max_turns {
            Some(limit) if history.len() > limit => &history[history.len() - limit..],
            _ => history,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Speaker> for PromptRole {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::User => Self::User,
            Speaker::Assistant => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// Built for one model call and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    system_prompt: Option<String>,
    history: Vec<Turn>,
    user_text: String,
    text: String,
}

impl PromptRequest {
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    /// The fully rendered single-string prompt.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn messages(&self) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(PromptMessage {
                role: PromptRole::System,
                content: system_prompt.clone(),
            });
        }
        messages.extend(self.history.iter().map(|turn| PromptMessage {
            role: turn.speaker().into(),
            content: turn.text().to_string(),
        }));
        messages.push(PromptMessage {
            role: PromptRole::User,
            content: self.user_text.clone(),
        });
        messages
    }
}

pub fn render(transcript: &[Turn], user_text: &str, system_prompt: &str) -> PromptRequest {
    render_with_window(transcript, user_text, system_prompt, HistoryWindow::unbounded())
}

pub fn render_with_window(
    transcript: &[Turn],
    user_text: &str,
    system_prompt: &str,
    window: HistoryWindow,
) -> PromptRequest {
    let system_prompt = (!system_prompt.trim().is_empty()).then(|| system_prompt.to_string());
    let history = window.apply(transcript).to_vec();

    let mut lines = Vec::with_capacity(history.len() + 2);
    if let Some(system_prompt) = &system_prompt {
        lines.push(system_prompt.clone());
    }
    lines.extend(
        history
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker().as_str(), turn.text())),
    );
    lines.push(user_text.to_string());

    PromptRequest {
        system_prompt,
        history,
        user_text: user_text.to_string(),
        text: lines.join(PROMPT_LINE_SEPARATOR),
    }
}
