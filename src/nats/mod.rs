pub mod client;
pub mod generation;
pub mod messages;
pub mod speech;

pub use client::NatsClient;
pub use generation::NatsGenerationBackend;
pub use messages::{GenerationChunkMessage, GenerationRequestMessage, TranscriptMessage};
pub use speech::NatsSpeechBackend;
