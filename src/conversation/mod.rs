//! Conversation state: the message log and the generation jobs that feed it
//!
//! - `parser` splits a streamed answer into reasoning and final text
//! - `log` is the ordered, observable store of turns
//! - `jobs` owns the single in-flight generation request

mod jobs;
mod log;
mod message;
mod parser;

pub use jobs::{JobSettings, JobStats, StreamJobController};
pub use log::{LogEvent, MessageLog};
pub use message::{Message, MessageStatus, NewMessage, Role};
pub use parser::{parse, ReasoningMarkers, Segments};
