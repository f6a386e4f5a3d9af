pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod nats;
pub mod session;
pub mod speech;

pub use backend::{GenerationBackend, JobId, SessionId, SpeechBackend};
pub use config::Config;
pub use conversation::{parse, Message, MessageLog, MessageStatus, Role, Segments, StreamJobController};
pub use error::{ConsoleError, Result};
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsGenerationBackend, NatsSpeechBackend};
pub use session::{ConversationSession, SessionConfig, SessionHandle, SessionStats};
pub use speech::{RecognitionController, RecognitionState};
