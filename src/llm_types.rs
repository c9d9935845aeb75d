//! Wire types for the Ollama chat API.
//!
//! Fragments may carry fields we don't use (`total_duration`,
//! `done_reason`, ...); serde ignores them.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A finalized chat message. Content cannot change once constructed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    role: Role,
    content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct FragmentMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

/// One line of the streamed `/api/chat` response.
#[derive(Debug, Deserialize)]
pub struct ResponseFragment {
    pub message: Option<FragmentMessage>,
    #[serde(default)]
    pub done: bool,
    pub model: Option<String>,
    pub created_at: Option<String>,
    pub eval_count: Option<u64>,
    pub eval_duration: Option<u64>,
    /// Set when the server aborts generation mid-stream.
    pub error: Option<String>,
}

impl ResponseFragment {
    pub fn delta_text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|message| message.content.as_deref())
    }

    pub fn is_final(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    pub version: Option<String>,
}
