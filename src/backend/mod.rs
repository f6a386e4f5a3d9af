//! Collaborator contracts for the speech and generation services
//!
//! Both backends are event sources: they are started with a request that
//! carries a tagged event sink, and report everything that happens later
//! through that sink. The conversation core only ever holds a handle that
//! can stop/abort the exchange.

mod events;

pub use events::{
    GenerationEvent, GenerationEvents, JobId, SessionEvent, SessionId, SpeechEvent, SpeechEvents,
};

use serde::{Deserialize, Serialize};

/// Speaker of a turn in the history sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of prompt context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request to open a continuous recognition session
#[derive(Debug, Clone)]
pub struct SpeechSessionRequest {
    /// Candidate languages for automatic language detection (e.g. "en-US")
    pub language_hints: Vec<String>,

    /// Sink for this session's events
    pub events: SpeechEvents,
}

/// Request to stream an answer for the given conversation
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Full prompt context, oldest first
    pub history: Vec<ChatTurn>,

    /// Sink for this job's events
    pub events: GenerationEvents,
}

/// Continuous speech recognition service
pub trait SpeechBackend: Send {
    /// Open a session; confirmation or failure arrives later through the sink
    fn open_session(&mut self, request: SpeechSessionRequest) -> anyhow::Result<Box<dyn SpeechHandle>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Live recognition session
pub trait SpeechHandle: Send {
    /// Ask the session to stop; `SpeechEvent::Stopped` confirms it
    fn stop(&mut self);
}

/// Text generation service
pub trait GenerationBackend: Send {
    /// Start streaming an answer; chunks arrive later through the sink
    fn send_conversation(&mut self, request: GenerationRequest) -> anyhow::Result<Box<dyn StreamHandle>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Live generation exchange
pub trait StreamHandle: Send {
    /// Best-effort stop; must not block on the remote side
    fn abort(&mut self);
}
