use super::config::SessionConfig;
use super::stats::{Notice, NoticeSource, SessionStats};
use crate::backend::{GenerationBackend, GenerationEvent, JobId, SessionEvent, SpeechBackend};
use crate::conversation::{LogEvent, Message, StreamJobController};
use crate::error::{ConsoleError, Result};
use crate::speech::RecognitionController;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// How often the loop checks the live job against the idle timeout
const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

const COMMAND_CAPACITY: usize = 64;
const NOTICE_CAPACITY: usize = 32;

enum Command {
    SendText {
        text: String,
        reply: oneshot::Sender<Result<JobId>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<bool>>,
    },
    Clear {
        reply: oneshot::Sender<Result<()>>,
    },
    StartVoice {
        reply: oneshot::Sender<bool>,
    },
    StopVoice {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Message>>,
    },
    SubscribeLog {
        reply: oneshot::Sender<broadcast::Receiver<LogEvent>>,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    Shutdown,
}

/// A conversation session: one message log, one speech session, one generation stream.
///
/// Everything runs on a single task. Commands from callers and callbacks from
/// both backends are queued and applied one at a time, so the controllers
/// never see interleaved mutations.
pub struct ConversationSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl ConversationSession {
    /// Create the controllers and start the session loop
    pub fn spawn(
        config: SessionConfig,
        speech: Box<dyn SpeechBackend>,
        generation: Box<dyn GenerationBackend>,
    ) -> Result<Self> {
        info!("Creating conversation session: {}", config.session_id);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);

        let jobs = StreamJobController::new(generation, event_tx.clone(), config.job_settings()?);
        let recognition =
            RecognitionController::new(speech, event_tx, config.recognition_settings());

        let session_loop = SessionLoop {
            session_id: config.session_id.clone(),
            started_at: Utc::now(),
            jobs,
            recognition,
            notices: notice_tx.clone(),
        };

        let task = tokio::spawn(session_loop.run(command_rx, event_rx));

        Ok(Self {
            handle: SessionHandle {
                commands: command_tx,
                notices: notice_tx,
            },
            task,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the loop, cancelling any live job and microphone session
    pub async fn shutdown(self) -> Result<SessionStats> {
        let stats = self.handle.stats().await?;

        // The loop may already be gone; the join below reports that
        let _ = self.handle.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            error!("Session task panicked: {}", e);
        }

        info!("Conversation session {} shut down", stats.session_id);
        Ok(stats)
    }
}

/// Cloneable entry point into a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    notices: broadcast::Sender<Notice>,
}

impl SessionHandle {
    /// Typed-input path: submit a user message and stream the answer
    pub async fn send_text(&self, text: impl Into<String>) -> Result<JobId> {
        let text = text.into();
        self.request(|reply| Command::SendText { text, reply }).await?
    }

    /// Cancel the answer being streamed; `false` if nothing was streaming
    pub async fn cancel(&self) -> Result<bool> {
        self.request(|reply| Command::Cancel { reply }).await?
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| Command::Clear { reply }).await?
    }

    /// Open the microphone session; `false` if one is already active
    pub async fn start_voice(&self) -> Result<bool> {
        self.request(|reply| Command::StartVoice { reply }).await
    }

    /// Close the microphone session; `false` if it was not listening
    pub async fn stop_voice(&self) -> Result<bool> {
        self.request(|reply| Command::StopVoice { reply }).await
    }

    /// Current contents of the message log
    pub async fn messages(&self) -> Result<Vec<Message>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Receive every subsequent change to the message log
    pub async fn subscribe_log(&self) -> Result<broadcast::Receiver<LogEvent>> {
        self.request(|reply| Command::SubscribeLog { reply }).await
    }

    /// Receive user-visible failure notifications
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ConsoleError::SessionClosed)?;
        response.await.map_err(|_| ConsoleError::SessionClosed)
    }
}

/// State owned by the session task
struct SessionLoop {
    session_id: String,
    started_at: DateTime<Utc>,
    jobs: StreamJobController,
    recognition: RecognitionController,
    notices: broadcast::Sender<Notice>,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        info!("Session loop started: {}", self.session_id);

        let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = idle_check.tick() => {
                    if let Err(e) = self.jobs.expire_idle(Instant::now()) {
                        self.report_violation(e);
                    }
                }
            }

            self.publish_notices();
        }

        if let Err(e) = self.jobs.cancel() {
            self.report_violation(e);
        }
        self.recognition.stop();

        info!("Session loop stopped: {}", self.session_id);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SendText { text, reply } => {
                let _ = reply.send(self.jobs.submit(&text));
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.jobs.cancel());
            }
            Command::Clear { reply } => {
                let _ = reply.send(self.jobs.clear());
            }
            Command::StartVoice { reply } => {
                let _ = reply.send(self.recognition.start());
            }
            Command::StopVoice { reply } => {
                let _ = reply.send(self.recognition.stop());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.jobs.log().snapshot());
            }
            Command::SubscribeLog { reply } => {
                let _ = reply.send(self.jobs.log().subscribe());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        let result = match event {
            SessionEvent::Speech { session, event } => {
                self.recognition.handle_event(session, event, &mut self.jobs)
            }
            SessionEvent::Generation { job, event } => match event {
                GenerationEvent::Chunk(chunk) => self.jobs.on_delta(job, &chunk).map(|_| ()),
                GenerationEvent::Done => self.jobs.on_complete(job).map(|_| ()),
                GenerationEvent::Error(cause) => self.jobs.on_error(job, &cause).map(|_| ()),
            },
        };

        if let Err(e) = result {
            self.report_violation(e);
        }
    }

    /// Contract failures inside the loop have no caller to fail; surface them loudly
    fn report_violation(&self, e: ConsoleError) {
        error!("Conversation contract violated: {}", e);
        self.notify(Notice::new(NoticeSource::Session, e.to_string()));
    }

    fn publish_notices(&mut self) {
        if let Some(message) = self.recognition.take_error() {
            self.notify(Notice::new(NoticeSource::Speech, message));
        }
        if let Some(message) = self.jobs.take_error() {
            self.notify(Notice::new(NoticeSource::Generation, message));
        }
    }

    fn notify(&self, notice: Notice) {
        if let Err(broadcast::error::SendError(notice)) = self.notices.send(notice) {
            warn!("Undelivered {:?} notice: {}", notice.source, notice.message);
        }
    }

    fn stats(&self) -> SessionStats {
        let uptime = Utc::now().signed_duration_since(self.started_at);
        let log = self.jobs.log();

        SessionStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            uptime_secs: uptime.num_milliseconds() as f64 / 1000.0,
            messages_count: log.len(),
            streaming: log.streaming().is_some(),
            recognition: self.recognition.state(),
            interim_text: self.recognition.last_interim_text().to_string(),
            jobs: self.jobs.stats(),
        }
    }
}
