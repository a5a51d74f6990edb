//! Message and request domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the caller supplies a `ChatRequest`, the assembler augments it with
//! harvested context, and either completion path sends it to the provider.

use serde::{Deserialize, Serialize};

/// Caller-chosen opaque identifier scoping memory persistence.
///
/// A blank id means "no persistence, no memory use" for that request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A blank id disables persistence for the request carrying it.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn's author in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,
}

impl ChatTurn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat completion request.
///
/// Turn order is caller-supplied and preserved; the assembler only ever
/// prepends one synthetic context turn at position 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered turns; must be non-empty
    pub turns: Vec<ChatTurn>,

    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate; the bridge applies a configured default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ChatRequest {
    /// Create a request from turns alone, with no system prompt or tuning.
    pub fn new(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns,
            system: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    /// The content of the most recent user turn, if any.
    pub fn latest_user_content(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}

/// An uploaded attachment accompanying a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename, if the uploader supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Declared media type, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Raw file bytes
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(
        filename: Option<String>,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            filename,
            content_type,
            data,
        }
    }

    /// The name to show in delimiters and placeholders.
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or("file")
    }
}
