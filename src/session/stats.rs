use crate::conversation::JobStats;
use crate::speech::RecognitionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Time since start in seconds
    pub uptime_secs: f64,

    /// Number of messages currently in the log
    pub messages_count: usize,

    /// Whether an answer is being streamed right now
    pub streaming: bool,

    /// Microphone session state
    pub recognition: RecognitionState,

    /// Provisional transcript of the utterance in progress
    pub interim_text: String,

    /// Generation job counters
    pub jobs: JobStats,
}

/// Where a user-visible failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSource {
    Speech,
    Generation,
    Session,
}

/// One-shot, toast-style failure notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub source: NoticeSource,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(source: NoticeSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
