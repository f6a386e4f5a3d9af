//! Conversation session management
//!
//! This module provides the `ConversationSession` composition root that:
//! - Owns the message log, the stream job controller and the recognition controller
//! - Serializes caller commands and backend callbacks onto one task
//! - Enforces the generation idle timeout
//! - Publishes user-visible failure notices

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{ConversationSession, SessionHandle};
pub use stats::{Notice, NoticeSource, SessionStats};
