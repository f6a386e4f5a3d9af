use super::client::{
    NatsClient, SPEECH_END_SUBJECT, TRANSCRIPT_FINAL_SUBJECT, TRANSCRIPT_PARTIAL_SUBJECT,
};
use super::messages::{SpeechAction, SpeechActivityMessage, TranscriptMessage};
use crate::backend::{SpeechBackend, SpeechEvents, SpeechHandle, SpeechSessionRequest};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Speech backend fed by the loqa STT service over NATS
pub struct NatsSpeechBackend {
    client: Arc<NatsClient>,
}

impl NatsSpeechBackend {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

impl SpeechBackend for NatsSpeechBackend {
    fn open_session(&mut self, request: SpeechSessionRequest) -> anyhow::Result<Box<dyn SpeechHandle>> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let client = Arc::clone(&self.client);

        tokio::spawn(run_session(client, request, stop_rx));

        Ok(Box::new(NatsSpeechHandle {
            stop_tx: Some(stop_tx),
        }))
    }

    fn name(&self) -> &str {
        "nats-stt"
    }
}

struct NatsSpeechHandle {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl SpeechHandle for NatsSpeechHandle {
    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // Session task already finished if the receiver is gone
            let _ = tx.send(());
        }
    }
}

async fn run_session(
    client: Arc<NatsClient>,
    request: SpeechSessionRequest,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let events = request.events;

    let mut speech_sub = match client.subscribe_speech().await {
        Ok(sub) => sub,
        Err(e) => {
            events.start_failed(format!("{:#}", e));
            return;
        }
    };

    if let Err(e) = client
        .publish_speech_control(SpeechAction::Start, &request.language_hints)
        .await
    {
        events.start_failed(format!("{:#}", e));
        return;
    }

    info!("Speech session {} listening", events.session());
    events.started();

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                if let Err(e) = client
                    .publish_speech_control(SpeechAction::Stop, &request.language_hints)
                    .await
                {
                    error!("Failed to stop speech service: {:#}", e);
                }
                events.stopped();
                break;
            }
            msg = speech_sub.next() => match msg {
                Some(msg) => {
                    let subject: &str = &msg.subject;
                    route_speech_message(&client, &events, subject, &msg.payload);
                }
                None => {
                    events.canceled("speech event stream closed");
                    break;
                }
            }
        }
    }

    info!("Speech session {} task stopped", events.session());
}

fn route_speech_message(client: &NatsClient, events: &SpeechEvents, subject: &str, payload: &[u8]) {
    match subject {
        TRANSCRIPT_PARTIAL_SUBJECT | TRANSCRIPT_FINAL_SUBJECT => {
            let transcript = match serde_json::from_slice::<TranscriptMessage>(payload) {
                Ok(transcript) => transcript,
                Err(e) => {
                    warn!("Failed to parse transcript message: {}", e);
                    return;
                }
            };

            // Filter by session_id
            if transcript.session_id != client.session_id() {
                return;
            }

            if transcript.partial {
                events.interim(transcript.text);
            } else if transcript.text.trim().is_empty() {
                events.no_match();
            } else {
                events.final_result(transcript.text);
            }
        }
        SPEECH_END_SUBJECT => match serde_json::from_slice::<SpeechActivityMessage>(payload) {
            Ok(activity) if activity.session_id == client.session_id() => events.silence(),
            Ok(_) => {}
            Err(e) => warn!("Failed to parse speech activity message: {}", e),
        },
        other => debug!("Ignoring speech subject {}", other),
    }
}
