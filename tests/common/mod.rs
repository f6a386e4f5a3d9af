// Fake speech and generation backends shared by the integration tests.
//
// The fakes never touch the network: they record what the controllers asked
// for and, when scripted, answer synchronously through the event sink.

#![allow(dead_code)]

use anyhow::anyhow;
use loqa_console::backend::{
    ChatTurn, GenerationBackend, GenerationEvents, GenerationRequest, JobId, SessionEvent,
    SessionId, SpeechBackend, SpeechEvents, SpeechHandle, SpeechSessionRequest, StreamHandle,
};
use loqa_console::conversation::{JobSettings, StreamJobController};
use loqa_console::speech::{RecognitionController, RecognitionSettings};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What the fake generation backend has seen
#[derive(Default)]
pub struct GenerationLog {
    pub requests: Vec<(JobId, Vec<ChatTurn>)>,
    pub sinks: Vec<GenerationEvents>,
    pub aborted: Vec<JobId>,
}

#[derive(Clone, Default)]
pub struct GenerationProbe(pub Arc<Mutex<GenerationLog>>);

impl GenerationProbe {
    pub fn request_count(&self) -> usize {
        self.0.lock().unwrap().requests.len()
    }

    pub fn history(&self, n: usize) -> Vec<ChatTurn> {
        self.0.lock().unwrap().requests[n].1.clone()
    }

    pub fn aborted(&self) -> Vec<JobId> {
        self.0.lock().unwrap().aborted.clone()
    }

    pub fn sink(&self, n: usize) -> GenerationEvents {
        self.0.lock().unwrap().sinks[n].clone()
    }
}

/// Generation backend that records requests; optionally answers each one
/// with a fixed script of chunks followed by `done`
pub struct FakeGeneration {
    probe: GenerationProbe,
    script: Option<Vec<String>>,
    fail: bool,
}

impl FakeGeneration {
    pub fn new() -> (Self, GenerationProbe) {
        let probe = GenerationProbe::default();
        (
            Self {
                probe: probe.clone(),
                script: None,
                fail: false,
            },
            probe,
        )
    }

    pub fn scripted(chunks: &[&str]) -> (Self, GenerationProbe) {
        let (mut backend, probe) = Self::new();
        backend.script = Some(chunks.iter().map(|c| c.to_string()).collect());
        (backend, probe)
    }

    pub fn failing() -> (Self, GenerationProbe) {
        let (mut backend, probe) = Self::new();
        backend.fail = true;
        (backend, probe)
    }
}

impl GenerationBackend for FakeGeneration {
    fn send_conversation(&mut self, request: GenerationRequest) -> anyhow::Result<Box<dyn StreamHandle>> {
        if self.fail {
            return Err(anyhow!("connection refused"));
        }

        let job = request.events.job();
        if let Some(script) = &self.script {
            for chunk in script {
                request.events.chunk(chunk.clone());
            }
            request.events.done();
        }

        let mut log = self.probe.0.lock().unwrap();
        log.requests.push((job, request.history));
        log.sinks.push(request.events);

        Ok(Box::new(FakeStream {
            job,
            probe: self.probe.clone(),
        }))
    }

    fn name(&self) -> &str {
        "fake-llm"
    }
}

struct FakeStream {
    job: JobId,
    probe: GenerationProbe,
}

impl StreamHandle for FakeStream {
    fn abort(&mut self) {
        self.probe.0.lock().unwrap().aborted.push(self.job);
    }
}

/// What the fake speech backend has seen
#[derive(Default)]
pub struct SpeechLog {
    pub opened: Vec<(SessionId, Vec<String>)>,
    pub sinks: Vec<SpeechEvents>,
    pub stops: usize,
}

#[derive(Clone, Default)]
pub struct SpeechProbe(pub Arc<Mutex<SpeechLog>>);

impl SpeechProbe {
    pub fn open_count(&self) -> usize {
        self.0.lock().unwrap().opened.len()
    }

    pub fn stops(&self) -> usize {
        self.0.lock().unwrap().stops
    }

    pub fn sink(&self, n: usize) -> SpeechEvents {
        self.0.lock().unwrap().sinks[n].clone()
    }

    pub fn language_hints(&self, n: usize) -> Vec<String> {
        self.0.lock().unwrap().opened[n].1.clone()
    }
}

/// Speech backend that records sessions; optionally confirms them at once
pub struct FakeSpeech {
    probe: SpeechProbe,
    auto_start: bool,
    fail: bool,
}

impl FakeSpeech {
    pub fn new() -> (Self, SpeechProbe) {
        let probe = SpeechProbe::default();
        (
            Self {
                probe: probe.clone(),
                auto_start: false,
                fail: false,
            },
            probe,
        )
    }

    pub fn auto_start() -> (Self, SpeechProbe) {
        let (mut backend, probe) = Self::new();
        backend.auto_start = true;
        (backend, probe)
    }

    pub fn failing() -> (Self, SpeechProbe) {
        let (mut backend, probe) = Self::new();
        backend.fail = true;
        (backend, probe)
    }
}

impl SpeechBackend for FakeSpeech {
    fn open_session(&mut self, request: SpeechSessionRequest) -> anyhow::Result<Box<dyn SpeechHandle>> {
        if self.fail {
            return Err(anyhow!("invalid subscription key"));
        }
        if self.auto_start {
            request.events.started();
        }

        let mut log = self.probe.0.lock().unwrap();
        log.opened.push((request.events.session(), request.language_hints));
        log.sinks.push(request.events);

        Ok(Box::new(FakeSpeechHandle {
            probe: self.probe.clone(),
        }))
    }

    fn name(&self) -> &str {
        "fake-stt"
    }
}

struct FakeSpeechHandle {
    probe: SpeechProbe,
}

impl SpeechHandle for FakeSpeechHandle {
    fn stop(&mut self) {
        self.probe.0.lock().unwrap().stops += 1;
    }
}

/// A job controller over a recording-only generation backend
pub fn job_controller(
    settings: JobSettings,
) -> (StreamJobController, GenerationProbe, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (backend, probe) = FakeGeneration::new();
    (StreamJobController::new(Box::new(backend), tx, settings), probe, rx)
}

/// A recognition controller plus job controller over recording-only backends
pub fn recognition_pair(
    settings: RecognitionSettings,
) -> (
    RecognitionController,
    StreamJobController,
    SpeechProbe,
    GenerationProbe,
) {
    let (tx, _rx) = mpsc::unbounded_channel();
    let (speech, speech_probe) = FakeSpeech::new();
    let (generation, generation_probe) = FakeGeneration::new();

    let recognition = RecognitionController::new(Box::new(speech), tx.clone(), settings);
    let jobs = StreamJobController::new(Box::new(generation), tx, JobSettings::default());

    (recognition, jobs, speech_probe, generation_probe)
}
