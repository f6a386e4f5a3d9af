//! HTTP API for driving the conversation from a front-end
//!
//! This module provides a REST API over the conversation session:
//! - GET /conversation/messages - Current message log
//! - POST /conversation/messages - Send typed user input
//! - GET /conversation/events - Live log changes and notices (SSE)
//! - POST /conversation/cancel - Cancel the answer being streamed
//! - POST /conversation/clear - Empty the log
//! - POST /voice/start, POST /voice/stop - Microphone session control
//! - GET /status - Session statistics
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
