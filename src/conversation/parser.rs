use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};

/// Delimiters wrapping the reasoning section of a model answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningMarkers {
    open: String,
    close: String,
}

impl ReasoningMarkers {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self> {
        let open = open.into();
        let close = close.into();

        if open.is_empty() || close.is_empty() {
            return Err(ConsoleError::Config(
                "reasoning markers must not be empty".to_string(),
            ));
        }
        if open == close {
            return Err(ConsoleError::Config(format!(
                "reasoning open and close markers must differ (both are {:?})",
                open
            )));
        }

        Ok(Self { open, close })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }

    fn strip(&self, text: &str) -> String {
        text.replace(&self.open, "").replace(&self.close, "")
    }
}

impl Default for ReasoningMarkers {
    fn default() -> Self {
        Self {
            open: "<think>".to_string(),
            close: "</think>".to_string(),
        }
    }
}

/// A raw answer buffer split into its reasoning and final-answer parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segments {
    /// Text between the markers (or after the open marker while still thinking)
    pub reasoning: String,

    /// Text outside the markers
    pub answer: String,

    /// The open marker has been seen but its close marker has not arrived yet
    pub is_partial: bool,
}

/// Split a (possibly truncated) answer buffer into reasoning and answer.
///
/// Stateless: the streaming path re-runs it over the whole buffer on every
/// delta, so the same input always yields the same segments.
pub fn parse(raw: &str, markers: &ReasoningMarkers) -> Segments {
    let Some(open_at) = raw.find(markers.open()) else {
        return Segments {
            reasoning: String::new(),
            answer: raw.trim().to_string(),
            is_partial: false,
        };
    };

    let body_start = open_at + markers.open().len();
    let body = &raw[body_start..];

    match body.find(markers.close()) {
        None => Segments {
            reasoning: markers.strip(body).trim().to_string(),
            answer: String::new(),
            is_partial: true,
        },
        Some(close_rel) => {
            let reasoning = &body[..close_rel];
            let before = &raw[..open_at];
            // The answer resumes right after the close marker
            let after = body[close_rel + markers.close().len()..].trim();

            Segments {
                reasoning: markers.strip(reasoning).trim().to_string(),
                answer: markers.strip(&format!("{before}{after}")).trim().to_string(),
                is_partial: false,
            }
        }
    }
}
