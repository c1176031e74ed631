use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("turn text must not be empty")]
    InvalidTurn,
}

/// One message from either side of a conversation. Text is stored trimmed and never changes
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
    #[serde(skip)]
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl AsRef<str>) -> Result<Self, TranscriptError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TranscriptError::InvalidTurn);
        }

        Ok(Self {
            speaker,
            text: trimmed.to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn user(text: impl AsRef<str>) -> Result<Self, TranscriptError> {
        Self::new(Speaker::User, text)
    }

    pub fn assistant(text: impl AsRef<str>) -> Result<Self, TranscriptError> {
        Self::new(Speaker::Assistant, text)
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Append-only, chronologically ordered history for a single session.
///
/// With a turn limit set, an append that goes over the limit evicts the oldest turns first.
/// Without one the transcript grows for as long as the session lives.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: VecDeque<Turn>,
    max_turns: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(max_turns: Option<usize>) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.filter(|limit| *limit > 0),
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);

        if let Some(limit) = self.max_turns {
            while self.turns.len() > limit {
                self.turns.pop_front();
            }
        }
    }

    /// Owned copy of the current turns; later appends are not visible through it.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }
}
