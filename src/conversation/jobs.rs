use super::log::MessageLog;
use super::message::{MessageStatus, NewMessage, Role};
use super::parser::{parse, ReasoningMarkers};
use crate::backend::{
    ChatRole, ChatTurn, GenerationBackend, GenerationEvents, GenerationRequest, JobId,
    SessionEvent, StreamHandle,
};
use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Settings that shape each generation request
#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    /// Delimiters of the reasoning section in streamed answers
    pub markers: ReasoningMarkers,

    /// Sent as the first turn of every request when set
    pub system_prompt: Option<String>,

    /// Maximum number of conversation turns sent to the model (0 = all)
    pub history_limit: usize,

    /// Abort a job that produced nothing for this long (None = wait forever)
    pub idle_timeout: Option<Duration>,
}

/// Counters for the jobs run by one controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub errored: u64,
    /// Callbacks dropped because their job was superseded or already over
    pub stale_events: u64,
    /// Time from submission to the first chunk of the latest job; reset on every submit
    pub first_chunk_latency_ms: Option<u64>,
}

/// One in-flight generation request
struct StreamJob {
    id: JobId,
    cancelled: bool,
    finished: bool,
    /// Raw text received so far, markers included
    buffer: String,
    handle: Option<Box<dyn StreamHandle>>,
    last_activity: Instant,
    received_first_chunk: bool,
}

impl StreamJob {
    fn is_live(&self) -> bool {
        !self.cancelled && !self.finished
    }

    fn abort(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Owns the current generation request and feeds its output into the message log.
///
/// At most one job is live. Every backend callback carries the `JobId` it was
/// issued for, and callbacks for any job other than the live one are dropped.
pub struct StreamJobController {
    log: MessageLog,
    backend: Box<dyn GenerationBackend>,
    events: mpsc::UnboundedSender<SessionEvent>,
    settings: JobSettings,
    current: Option<StreamJob>,
    last_error: Option<String>,
    stats: JobStats,
}

impl StreamJobController {
    pub fn new(
        backend: Box<dyn GenerationBackend>,
        events: mpsc::UnboundedSender<SessionEvent>,
        settings: JobSettings,
    ) -> Self {
        Self {
            log: MessageLog::new(),
            backend,
            events,
            settings,
            current: None,
            last_error: None,
            stats: JobStats::default(),
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Id of the job currently streaming, if any
    pub fn live_job(&self) -> Option<JobId> {
        self.current.as_ref().filter(|j| j.is_live()).map(|j| j.id)
    }

    pub fn stats(&self) -> JobStats {
        self.stats
    }

    /// Record a user turn and start streaming the assistant's answer to it.
    ///
    /// Any live job is cancelled first. Returns as soon as the request has been
    /// handed to the backend.
    pub fn submit(&mut self, text: &str) -> Result<JobId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConsoleError::EmptyInput);
        }

        self.cancel()?;

        self.log.append(NewMessage::user(text))?;
        let history = self.build_history();
        self.log.append(NewMessage::streaming_assistant())?;

        let id = JobId::new();
        self.stats.started += 1;
        self.stats.first_chunk_latency_ms = None;
        info!(
            "Starting stream job {} on {} ({} turns of context)",
            id,
            self.backend.name(),
            history.len()
        );

        let request = GenerationRequest {
            history,
            events: GenerationEvents::new(id, self.events.clone()),
        };

        let mut job = StreamJob {
            id,
            cancelled: false,
            finished: false,
            buffer: String::new(),
            handle: None,
            last_activity: Instant::now(),
            received_first_chunk: false,
        };

        match self.backend.send_conversation(request) {
            Ok(handle) => {
                job.handle = Some(handle);
                self.current = Some(job);
            }
            Err(e) => {
                job.finished = true;
                self.current = Some(job);
                self.stats.errored += 1;
                self.log.finalize(MessageStatus::Errored)?;
                self.record_error(format!("Failed to start generation: {:#}", e));
            }
        }

        Ok(id)
    }

    /// Apply a streamed chunk. Returns whether it was accepted.
    pub fn on_delta(&mut self, id: JobId, chunk: &str) -> Result<bool> {
        let Some(job) = live_job_mut(&mut self.current, id, &mut self.stats) else {
            return Ok(false);
        };

        let now = Instant::now();
        if !job.received_first_chunk {
            job.received_first_chunk = true;
            let latency = now.saturating_duration_since(job.last_activity);
            self.stats.first_chunk_latency_ms = Some(latency.as_millis() as u64);
            debug!("First chunk of stream job {} after {:?}", id, latency);
        }

        job.buffer.push_str(chunk);
        job.last_activity = now;
        let segments = parse(&job.buffer, &self.settings.markers);

        self.log.update_streaming(&segments, MessageStatus::Streaming)?;
        Ok(true)
    }

    pub fn on_complete(&mut self, id: JobId) -> Result<bool> {
        let Some(job) = live_job_mut(&mut self.current, id, &mut self.stats) else {
            return Ok(false);
        };

        job.finished = true;
        job.handle = None;
        info!("Stream job {} complete ({} bytes)", id, job.buffer.len());

        self.stats.completed += 1;
        self.log.finalize(MessageStatus::Complete)?;
        Ok(true)
    }

    pub fn on_error(&mut self, id: JobId, cause: &str) -> Result<bool> {
        let Some(job) = live_job_mut(&mut self.current, id, &mut self.stats) else {
            return Ok(false);
        };

        job.finished = true;
        job.handle = None;

        self.stats.errored += 1;
        self.log.finalize(MessageStatus::Errored)?;
        self.record_error(format!("Generation failed: {}", cause));
        Ok(true)
    }

    /// Cancel the live job, if any.
    ///
    /// The log shows the cancellation immediately; the backend is only asked to
    /// stop and anything it still delivers for this job is dropped.
    pub fn cancel(&mut self) -> Result<bool> {
        let Some(job) = self.current.as_mut().filter(|j| j.is_live()) else {
            return Ok(false);
        };

        job.cancelled = true;
        job.abort();
        info!("Cancelled stream job {}", job.id);

        self.stats.cancelled += 1;
        self.log.finalize(MessageStatus::Cancelled)?;
        Ok(true)
    }

    /// Cancel the live job and empty the log
    pub fn clear(&mut self) -> Result<()> {
        self.cancel()?;
        self.current = None;
        self.log.clear();
        Ok(())
    }

    /// Fail the live job if it has been silent for longer than the idle timeout
    pub fn expire_idle(&mut self, now: Instant) -> Result<bool> {
        let Some(timeout) = self.settings.idle_timeout else {
            return Ok(false);
        };
        let Some(job) = self.current.as_mut().filter(|j| j.is_live()) else {
            return Ok(false);
        };
        if now.saturating_duration_since(job.last_activity) < timeout {
            return Ok(false);
        }

        job.finished = true;
        job.abort();
        warn!("Stream job {} idle for {:?}, aborting", job.id, timeout);

        self.stats.errored += 1;
        self.log.finalize(MessageStatus::Errored)?;
        self.record_error(format!(
            "No response from the model within {} seconds",
            timeout.as_secs()
        ));
        Ok(true)
    }

    /// Take the most recent user-visible failure, if one is pending
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    fn record_error(&mut self, cause: String) {
        error!("{}", cause);
        self.last_error = Some(cause);
    }

    /// Prompt context for the next request: finished user/assistant turns only
    fn build_history(&self) -> Vec<ChatTurn> {
        let mut turns: Vec<ChatTurn> = self
            .log
            .messages()
            .iter()
            .filter_map(|m| match (m.role, m.status) {
                (Role::User, _) => Some(ChatTurn::new(ChatRole::User, &m.text)),
                (Role::Assistant, MessageStatus::Complete) if !m.text.is_empty() => {
                    Some(ChatTurn::new(ChatRole::Assistant, &m.text))
                }
                _ => None,
            })
            .collect();

        let limit = self.settings.history_limit;
        if limit > 0 && turns.len() > limit {
            turns.drain(..turns.len() - limit);
        }

        if let Some(prompt) = self
            .settings
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            turns.insert(0, ChatTurn::new(ChatRole::System, prompt));
        }

        turns
    }
}

fn live_job_mut<'a>(
    current: &'a mut Option<StreamJob>,
    id: JobId,
    stats: &mut JobStats,
) -> Option<&'a mut StreamJob> {
    let live = matches!(current.as_ref(), Some(job) if job.id == id && job.is_live());
    if !live {
        stats.stale_events += 1;
        debug!("Dropping stale callback for stream job {}", id);
        return None;
    }
    current.as_mut()
}
