use super::messages::{
    GenerationCancelMessage, GenerationRequestMessage, SpeechAction, SpeechControlMessage,
};
use crate::backend::{ChatTurn, JobId};
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::{debug, info};

/// Subject carrying every STT event (`stt.text.partial`, `stt.text.final`, `stt.speech.end`)
pub const SPEECH_SUBJECT: &str = "stt.>";
pub const TRANSCRIPT_PARTIAL_SUBJECT: &str = "stt.text.partial";
pub const TRANSCRIPT_FINAL_SUBJECT: &str = "stt.text.final";
pub const SPEECH_END_SUBJECT: &str = "stt.speech.end";
pub const GENERATION_REQUEST_SUBJECT: &str = "llm.request";

pub struct NatsClient {
    client: Client,
    session_id: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, session_id: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client, session_id })
    }

    /// Session id used to tag outgoing messages and filter incoming ones
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to all STT events; callers filter by session_id in the payload
    pub async fn subscribe_speech(&self) -> Result<async_nats::Subscriber> {
        info!("Subscribing to speech events on {}", SPEECH_SUBJECT);

        let subscriber = self
            .client
            .subscribe(SPEECH_SUBJECT)
            .await
            .context("Failed to subscribe to speech events")?;

        Ok(subscriber)
    }

    /// Tell the STT service to start or stop transcribing this session
    pub async fn publish_speech_control(
        &self,
        action: SpeechAction,
        language_hints: &[String],
    ) -> Result<()> {
        let subject = format!("stt.control.{}", action.as_str());

        let message = SpeechControlMessage {
            session_id: self.session_id.clone(),
            action,
            language_hints: language_hints.to_vec(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        self.publish_json(subject, &message)
            .await
            .context("Failed to publish speech control")
    }

    /// Subscribe to the response stream of one generation job
    pub async fn subscribe_generation(&self, job: JobId) -> Result<async_nats::Subscriber> {
        let subject = format!("llm.response.{}", job);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        debug!("Subscribed to {}", subject);
        Ok(subscriber)
    }

    /// Publish a generation request for a job
    pub async fn publish_generation_request(&self, job: JobId, history: &[ChatTurn]) -> Result<()> {
        let message = GenerationRequestMessage {
            job_id: job.to_string(),
            session_id: self.session_id.clone(),
            messages: history.to_vec(),
            stream: true,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        self.publish_json(GENERATION_REQUEST_SUBJECT.to_string(), &message)
            .await
            .context("Failed to publish generation request")?;

        info!(
            "Published generation request (job={}, turns={})",
            job,
            history.len()
        );
        Ok(())
    }

    /// Ask the LLM service to stop producing output for a job
    pub async fn publish_generation_cancel(&self, job: JobId) -> Result<()> {
        let message = GenerationCancelMessage {
            job_id: job.to_string(),
            session_id: self.session_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        self.publish_json(format!("llm.cancel.{}", job), &message)
            .await
            .context("Failed to publish generation cancel")
    }

    async fn publish_json<T: serde::Serialize>(&self, subject: String, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!("Published to {}", subject);
        Ok(())
    }
}
