use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Code listings emitted by the system; rendered line-numbered, never sent back to the model
    Code,
}

/// Lifecycle of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Cancelled,
    Errored,
}

impl MessageStatus {
    /// Whether the status ends a message's lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Errored)
    }
}

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the log, assigned at append time
    pub index: u64,

    /// When the message was appended
    pub created_at: DateTime<Utc>,

    pub role: Role,

    /// Final-answer text (for assistant messages, the text outside the reasoning markers)
    pub text: String,

    /// Reasoning text, if the model emitted any
    pub reasoning: String,

    /// Reasoning is still open; render with a "thinking" affordance
    pub thinking: bool,

    pub status: MessageStatus,
}

impl Message {
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

/// A message about to be appended; the log assigns index and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
}

impl NewMessage {
    /// A completed user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            status: MessageStatus::Complete,
        }
    }

    /// An empty assistant turn about to receive streamed text
    pub fn streaming_assistant() -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            status: MessageStatus::Streaming,
        }
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self {
            role: Role::Code,
            text: text.into(),
            status: MessageStatus::Complete,
        }
    }
}
