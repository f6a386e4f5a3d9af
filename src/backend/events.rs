use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of one microphone session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Callbacks a speech backend can deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// The session is open and listening
    Started,
    /// The session could not be opened
    StartFailed(String),
    /// Provisional transcript for the current utterance
    Interim(String),
    /// Completed utterance; `None` when nothing was recognized
    Final(Option<String>),
    /// End of speech detected
    Silence,
    /// The backend aborted the session (protocol error, auth failure, ...)
    Canceled(String),
    /// The session has ended
    Stopped,
}

/// Callbacks a generation backend can deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    Chunk(String),
    Done,
    Error(String),
}

/// Everything the backends report, tagged with the session or job it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Speech { session: SessionId, event: SpeechEvent },
    Generation { job: JobId, event: GenerationEvent },
}

/// Event sink handed to a speech backend for one session
#[derive(Debug, Clone)]
pub struct SpeechEvents {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SpeechEvents {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn started(&self) {
        self.send(SpeechEvent::Started);
    }

    pub fn start_failed(&self, reason: impl Into<String>) {
        self.send(SpeechEvent::StartFailed(reason.into()));
    }

    pub fn interim(&self, text: impl Into<String>) {
        self.send(SpeechEvent::Interim(text.into()));
    }

    pub fn final_result(&self, text: impl Into<String>) {
        self.send(SpeechEvent::Final(Some(text.into())));
    }

    pub fn no_match(&self) {
        self.send(SpeechEvent::Final(None));
    }

    pub fn silence(&self) {
        self.send(SpeechEvent::Silence);
    }

    pub fn canceled(&self, reason: impl Into<String>) {
        self.send(SpeechEvent::Canceled(reason.into()));
    }

    pub fn stopped(&self) {
        self.send(SpeechEvent::Stopped);
    }

    fn send(&self, event: SpeechEvent) {
        // Receiver gone means the session loop has shut down
        let _ = self.tx.send(SessionEvent::Speech {
            session: self.session,
            event,
        });
    }
}

/// Event sink handed to a generation backend for one job
#[derive(Debug, Clone)]
pub struct GenerationEvents {
    job: JobId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl GenerationEvents {
    pub fn new(job: JobId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { job, tx }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn chunk(&self, text: impl Into<String>) {
        self.send(GenerationEvent::Chunk(text.into()));
    }

    pub fn done(&self) {
        self.send(GenerationEvent::Done);
    }

    pub fn error(&self, cause: impl Into<String>) {
        self.send(GenerationEvent::Error(cause.into()));
    }

    fn send(&self, event: GenerationEvent) {
        let _ = self.tx.send(SessionEvent::Generation { job: self.job, event });
    }
}
