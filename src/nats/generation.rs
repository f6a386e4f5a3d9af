use super::client::NatsClient;
use super::messages::GenerationChunkMessage;
use crate::backend::{
    GenerationBackend, GenerationEvents, GenerationRequest, JobId, StreamHandle,
};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Generation backend talking to the loqa LLM service over NATS
pub struct NatsGenerationBackend {
    client: Arc<NatsClient>,
}

impl NatsGenerationBackend {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

impl GenerationBackend for NatsGenerationBackend {
    fn send_conversation(&mut self, request: GenerationRequest) -> anyhow::Result<Box<dyn StreamHandle>> {
        let job = request.events.job();
        let client = Arc::clone(&self.client);

        let task = tokio::spawn(run_exchange(client, request));

        Ok(Box::new(NatsStreamHandle {
            job,
            client: Arc::clone(&self.client),
            task: Some(task),
        }))
    }

    fn name(&self) -> &str {
        "nats-llm"
    }
}

struct NatsStreamHandle {
    job: JobId,
    client: Arc<NatsClient>,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle for NatsStreamHandle {
    fn abort(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();

        // Fire and forget: the local side has already moved on
        let client = Arc::clone(&self.client);
        let job = self.job;
        tokio::spawn(async move {
            if let Err(e) = client.publish_generation_cancel(job).await {
                warn!("Failed to cancel generation job {}: {:#}", job, e);
            }
        });
    }
}

async fn run_exchange(client: Arc<NatsClient>, request: GenerationRequest) {
    let events = request.events;
    let job = events.job();

    // Subscribe before publishing so no early chunk is missed
    let mut response_sub = match client.subscribe_generation(job).await {
        Ok(sub) => sub,
        Err(e) => {
            events.error(format!("{:#}", e));
            return;
        }
    };

    if let Err(e) = client.publish_generation_request(job, &request.history).await {
        events.error(format!("{:#}", e));
        return;
    }

    while let Some(msg) = response_sub.next().await {
        if forward_chunk(&events, &msg.payload) {
            info!("Generation job {} finished", job);
            return;
        }
    }

    error!("Response stream for job {} closed early", job);
    events.error("response stream closed before the answer completed");
}

/// Forward one response message; returns true once the job has ended
fn forward_chunk(events: &GenerationEvents, payload: &[u8]) -> bool {
    let chunk = match serde_json::from_slice::<GenerationChunkMessage>(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse generation chunk: {}", e);
            return false;
        }
    };

    if let Some(cause) = chunk.error {
        events.error(cause);
        return true;
    }
    if let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) {
        events.chunk(delta);
    }
    if chunk.done {
        events.done();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerationEvent, SessionEvent};
    use tokio::sync::mpsc;

    fn sink() -> (GenerationEvents, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (GenerationEvents::new(JobId::new(), tx), rx)
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Option<GenerationEvent> {
        match rx.try_recv().ok()? {
            SessionEvent::Generation { event, .. } => Some(event),
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_delta_is_forwarded() {
        let (events, mut rx) = sink();

        let finished = forward_chunk(&events, br#"{"job_id":"j","delta":"Hel"}"#);

        assert!(!finished);
        assert_eq!(next_event(&mut rx), Some(GenerationEvent::Chunk("Hel".to_string())));
        assert_eq!(next_event(&mut rx), None);
    }

    #[test]
    fn test_final_chunk_carries_delta_then_done() {
        let (events, mut rx) = sink();

        assert!(forward_chunk(&events, br#"{"job_id":"j","delta":"!","done":true}"#));
        assert_eq!(next_event(&mut rx), Some(GenerationEvent::Chunk("!".to_string())));
        assert_eq!(next_event(&mut rx), Some(GenerationEvent::Done));
    }

    #[test]
    fn test_error_ends_the_job() {
        let (events, mut rx) = sink();

        assert!(forward_chunk(&events, br#"{"job_id":"j","error":"model overloaded"}"#));
        assert_eq!(
            next_event(&mut rx),
            Some(GenerationEvent::Error("model overloaded".to_string()))
        );
        assert_eq!(next_event(&mut rx), None);
    }

    #[test]
    fn test_empty_delta_and_garbage_are_skipped() {
        let (events, mut rx) = sink();

        assert!(!forward_chunk(&events, br#"{"job_id":"j","delta":""}"#));
        assert!(!forward_chunk(&events, b"not json"));
        assert_eq!(next_event(&mut rx), None);
    }
}
