use crate::session::SessionConfig;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub speech: SpeechConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// Session id the STT and LLM services tag their messages with
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeechConfig {
    pub language_hints: Vec<String>,
    /// Interim transcripts cancel the answer being streamed
    #[serde(default = "default_forward_interim")]
    pub forward_interim: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Past turns sent with each request (0 = all)
    #[serde(default)]
    pub history_limit: usize,
    /// Seconds without output before a job is failed (0 = never)
    #[serde(default)]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_reasoning_open")]
    pub reasoning_open: String,
    #[serde(default = "default_reasoning_close")]
    pub reasoning_close: String,
}

fn default_forward_interim() -> bool {
    true
}

fn default_reasoning_open() -> String {
    "<think>".to_string()
}

fn default_reasoning_close() -> String {
    "</think>".to_string()
}

impl Config {
    /// Load from a config file (extension optional), overridden by
    /// `LOQA_CONSOLE__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LOQA_CONSOLE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Runtime settings for the conversation session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            session_id: self.nats.session_id.clone(),
            language_hints: self.speech.language_hints.clone(),
            forward_interim: self.speech.forward_interim,
            system_prompt: self.generation.system_prompt.clone(),
            history_limit: self.generation.history_limit,
            idle_timeout: match self.generation.idle_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            reasoning_open: self.generation.reasoning_open.clone(),
            reasoning_close: self.generation.reasoning_close.clone(),
        }
    }
}
