use crate::backend::{
    SessionEvent, SessionId, SpeechBackend, SpeechEvent, SpeechEvents, SpeechHandle,
    SpeechSessionRequest,
};
use crate::conversation::StreamJobController;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Settings for continuous recognition
#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    /// Candidate languages for automatic detection
    pub language_hints: Vec<String>,

    /// Treat interim transcripts as input: speech activity pre-empts the answer being streamed
    pub forward_interim: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language_hints: vec!["zh-CN".to_string(), "en-US".to_string()],
            forward_interim: true,
        }
    }
}

/// Microphone session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionState {
    Idle,
    Connecting,
    Listening,
    Recognizing,
    Stopping,
    Errored,
}

/// Live session bookkeeping; dropped whenever the session ends
struct ActiveSession {
    id: SessionId,
    handle: Box<dyn SpeechHandle>,
}

/// Drives the continuous recognition session and turns utterances into stream jobs.
///
/// Speech events are tagged with the session they were issued for; events
/// from a session that has since been discarded are dropped.
pub struct RecognitionController {
    backend: Box<dyn SpeechBackend>,
    events: mpsc::UnboundedSender<SessionEvent>,
    settings: RecognitionSettings,
    state: RecognitionState,
    session: Option<ActiveSession>,
    last_interim_text: String,
    last_error: Option<String>,
    pending_notice: Option<String>,
}

impl RecognitionController {
    pub fn new(
        backend: Box<dyn SpeechBackend>,
        events: mpsc::UnboundedSender<SessionEvent>,
        settings: RecognitionSettings,
    ) -> Self {
        Self {
            backend,
            events,
            settings,
            state: RecognitionState::Idle,
            session: None,
            last_interim_text: String::new(),
            last_error: None,
            pending_notice: None,
        }
    }

    pub fn state(&self) -> RecognitionState {
        self.state
    }

    /// Id of the live session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Provisional transcript of the utterance in progress
    pub fn last_interim_text(&self) -> &str {
        &self.last_interim_text
    }

    /// The failure that put the controller in `Errored`, if it is still there
    pub fn last_error(&self) -> Option<&str> {
        match self.state {
            RecognitionState::Errored => self.last_error.as_deref(),
            _ => None,
        }
    }

    /// Open a microphone session. Ignored unless no session is active.
    pub fn start(&mut self) -> bool {
        if !matches!(self.state, RecognitionState::Idle | RecognitionState::Errored) {
            warn!("Recognition already active ({:?}), ignoring start", self.state);
            return false;
        }

        let id = SessionId::new();
        info!("Starting recognition session {} on {}", id, self.backend.name());

        self.state = RecognitionState::Connecting;
        self.last_interim_text.clear();

        let request = SpeechSessionRequest {
            language_hints: self.settings.language_hints.clone(),
            events: SpeechEvents::new(id, self.events.clone()),
        };

        match self.backend.open_session(request) {
            Ok(handle) => {
                self.session = Some(ActiveSession { id, handle });
                true
            }
            Err(e) => {
                self.fail(format!("Failed to connect to speech service: {:#}", e));
                false
            }
        }
    }

    /// Ask the backend to end the session. Ignored unless listening.
    pub fn stop(&mut self) -> bool {
        if !matches!(
            self.state,
            RecognitionState::Listening | RecognitionState::Recognizing
        ) {
            warn!("Recognition not listening ({:?}), ignoring stop", self.state);
            return false;
        }

        info!("Stopping recognition");
        self.state = RecognitionState::Stopping;
        self.last_interim_text.clear();

        if let Some(session) = self.session.as_mut() {
            session.handle.stop();
        }
        true
    }

    /// Route one backend event; stale sessions are dropped
    pub fn handle_event(
        &mut self,
        session: SessionId,
        event: SpeechEvent,
        jobs: &mut StreamJobController,
    ) -> Result<()> {
        if self.session_id() != Some(session) {
            debug!("Dropping {:?} from stale recognition session {}", event, session);
            return Ok(());
        }

        match event {
            SpeechEvent::Started => self.on_started(),
            SpeechEvent::StartFailed(reason) => self.on_start_failed(&reason),
            SpeechEvent::Interim(text) => self.on_interim(&text, jobs)?,
            SpeechEvent::Final(result) => self.on_final(result.as_deref(), jobs)?,
            SpeechEvent::Silence => self.on_silence(),
            SpeechEvent::Canceled(reason) => self.on_canceled(&reason),
            SpeechEvent::Stopped => self.on_stopped(),
        }
        Ok(())
    }

    fn on_started(&mut self) {
        if self.state != RecognitionState::Connecting {
            debug!("Ignoring session confirmation in {:?}", self.state);
            return;
        }
        info!("Recognition started");
        self.state = RecognitionState::Listening;
    }

    fn on_start_failed(&mut self, reason: &str) {
        self.fail(format!("Failed to connect to speech service: {}", reason));
    }

    fn on_interim(&mut self, text: &str, jobs: &mut StreamJobController) -> Result<()> {
        if !self.is_listening() {
            return Ok(());
        }

        debug!("Recognizing: {}", text);
        self.state = RecognitionState::Recognizing;
        self.last_interim_text = text.to_string();

        if self.settings.forward_interim {
            jobs.cancel()?;
        }
        Ok(())
    }

    fn on_final(&mut self, result: Option<&str>, jobs: &mut StreamJobController) -> Result<()> {
        if !self.is_listening() {
            return Ok(());
        }

        self.state = RecognitionState::Listening;
        self.last_interim_text.clear();

        let text = match result.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => {
                info!("No speech recognized");
                return Ok(());
            }
        };

        info!("Final result: {}", text);
        jobs.cancel()?;
        jobs.submit(text).map(|_| ())
    }

    fn on_silence(&mut self) {
        debug!("Silence detected");
    }

    fn on_canceled(&mut self, reason: &str) {
        if let Some(session) = self.session.as_mut() {
            session.handle.stop();
        }
        self.fail(format!("Speech recognition canceled: {}", reason));
    }

    fn on_stopped(&mut self) {
        match self.state {
            RecognitionState::Stopping => info!("Recognition stopped"),
            state => warn!("Recognition session ended by the backend while {:?}", state),
        }
        self.state = RecognitionState::Idle;
        self.session = None;
        self.last_interim_text.clear();
    }

    fn is_listening(&self) -> bool {
        matches!(
            self.state,
            RecognitionState::Listening | RecognitionState::Recognizing
        )
    }

    fn fail(&mut self, cause: String) {
        error!("{}", cause);
        self.state = RecognitionState::Errored;
        self.session = None;
        self.last_interim_text.clear();
        self.last_error = Some(cause.clone());
        self.pending_notice = Some(cause);
    }

    /// Take the most recent failure for a one-shot notification
    pub fn take_error(&mut self) -> Option<String> {
        self.pending_notice.take()
    }
}
