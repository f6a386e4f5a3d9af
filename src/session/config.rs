use crate::conversation::{JobSettings, ReasoningMarkers};
use crate::error::Result;
use crate::speech::RecognitionSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "console-4f1c...")
    pub session_id: String,

    /// Languages the speech service should auto-detect between
    pub language_hints: Vec<String>,

    /// Let interim transcripts pre-empt a streaming answer
    /// Default: true (assistant profile behaviour)
    pub forward_interim: bool,

    /// Prepended to every request as a system turn
    pub system_prompt: Option<String>,

    /// Maximum number of past turns sent with each request (0 = all)
    pub history_limit: usize,

    /// Give up on a generation that has been silent this long
    /// Default: none (only cancellation or new speech ends a hung stream)
    pub idle_timeout: Option<Duration>,

    /// Marker opening the reasoning section of an answer
    pub reasoning_open: String,

    /// Marker closing the reasoning section of an answer
    pub reasoning_close: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("console-{}", uuid::Uuid::new_v4()),
            language_hints: vec!["zh-CN".to_string(), "en-US".to_string()],
            forward_interim: true,
            system_prompt: None,
            history_limit: 0,
            idle_timeout: None,
            reasoning_open: "<think>".to_string(),
            reasoning_close: "</think>".to_string(),
        }
    }
}

impl SessionConfig {
    /// Settings for the stream job controller
    pub fn job_settings(&self) -> Result<JobSettings> {
        Ok(JobSettings {
            markers: ReasoningMarkers::new(&self.reasoning_open, &self.reasoning_close)?,
            system_prompt: self.system_prompt.clone(),
            history_limit: self.history_limit,
            idle_timeout: self.idle_timeout.filter(|t| !t.is_zero()),
        })
    }

    /// Settings for the recognition controller
    pub fn recognition_settings(&self) -> RecognitionSettings {
        RecognitionSettings {
            language_hints: self.language_hints.clone(),
            forward_interim: self.forward_interim,
        }
    }
}
