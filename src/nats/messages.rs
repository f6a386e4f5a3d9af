use crate::backend::ChatTurn;
use serde::{Deserialize, Serialize};

/// Transcript message received from the STT service
/// (`stt.text.partial` / `stt.text.final`)
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// End-of-speech notification from the STT service (`stt.speech.end`)
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechActivityMessage {
    pub session_id: String,
    pub timestamp: String,
}

/// Control message published to the STT service (`stt.control.*`)
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechControlMessage {
    pub session_id: String,
    pub action: SpeechAction,
    #[serde(default)]
    pub language_hints: Vec<String>,
    pub timestamp: String,  // RFC3339 timestamp
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechAction {
    Start,
    Stop,
}

impl SpeechAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Generation request published to the LLM service (`llm.request`)
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequestMessage {
    pub job_id: String,
    pub session_id: String,
    pub messages: Vec<ChatTurn>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    pub timestamp: String,  // RFC3339 timestamp
}

fn default_stream() -> bool {
    true
}

/// One streamed piece of an answer (`llm.response.<job_id>`)
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationChunkMessage {
    pub job_id: String,
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Asks the LLM service to stop a job (`llm.cancel.<job_id>`)
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationCancelMessage {
    pub job_id: String,
    pub session_id: String,
    pub timestamp: String,
}
