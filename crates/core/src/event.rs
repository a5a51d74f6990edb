//! Output events — the public streaming protocol.
//!
//! `OutputEvent` is what consumers of the streaming bridge receive over SSE
//! or WebSocket. A valid stream is zero or more `Delta` events followed by
//! exactly one `Done` or `Error`, never both, never more than one terminal.

use serde::{Deserialize, Serialize};

/// Events emitted on the output channel of a streaming run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    /// Partial text fragment from the model.
    Delta { text: String },

    /// The stream completed normally.
    Done,

    /// The stream failed; no further events follow.
    Error { message: String },
}

impl OutputEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Delta { .. } => "delta",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}
