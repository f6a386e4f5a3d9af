use super::state::AppState;
use crate::backend::JobId;
use crate::conversation::LogEvent;
use crate::error::ConsoleError;
use crate::session::Notice;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// User input to submit
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub job_id: JobId,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    /// Whether the request changed anything
    pub applied: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: ConsoleError) -> Response {
    let status = match e {
        ConsoleError::EmptyInput => StatusCode::BAD_REQUEST,
        ConsoleError::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn action_response(applied: bool, done: &str, skipped: &str) -> Response {
    (
        StatusCode::OK,
        Json(ActionResponse {
            applied,
            message: if applied { done } else { skipped }.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /conversation/messages
/// Snapshot of the message log
pub async fn get_messages(State(state): State<AppState>) -> Response {
    match state.session.messages().await {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /conversation/messages
/// Submit typed input and start streaming the answer
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    match state.session.send_text(req.text).await {
        Ok(job_id) => {
            info!("Accepted typed message (job {})", job_id);
            (
                StatusCode::ACCEPTED,
                Json(SendMessageResponse {
                    job_id,
                    status: "streaming".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /conversation/cancel
/// Cancel the answer being streamed
pub async fn cancel_response(State(state): State<AppState>) -> Response {
    match state.session.cancel().await {
        Ok(applied) => action_response(applied, "Response cancelled", "Nothing is streaming"),
        Err(e) => error_response(e),
    }
}

/// POST /conversation/clear
/// Empty the conversation
pub async fn clear_conversation(State(state): State<AppState>) -> Response {
    match state.session.clear().await {
        Ok(()) => action_response(true, "Conversation cleared", ""),
        Err(e) => error_response(e),
    }
}

/// POST /voice/start
/// Open the microphone session
pub async fn start_voice(State(state): State<AppState>) -> Response {
    match state.session.start_voice().await {
        Ok(applied) => action_response(
            applied,
            "Connecting to speech service",
            "Voice input is already active",
        ),
        Err(e) => error_response(e),
    }
}

/// POST /voice/stop
/// Close the microphone session
pub async fn stop_voice(State(state): State<AppState>) -> Response {
    match state.session.stop_voice().await {
        Ok(applied) => action_response(applied, "Stopping voice input", "Voice input is not listening"),
        Err(e) => error_response(e),
    }
}

/// GET /conversation/events
/// Server-sent stream of log changes and user-visible notices
pub async fn conversation_events(State(state): State<AppState>) -> Response {
    let log = match state.session.subscribe_log().await {
        Ok(log) => log,
        Err(e) => return error_response(e),
    };
    let notices = state.session.subscribe_notices();

    info!("Event stream client connected");
    let events = stream::unfold((log, notices), |(mut log, mut notices)| async move {
        loop {
            let next = tokio::select! {
                event = log.recv() => event.map(log_event),
                notice = notices.recv() => notice.map(|n| notice_event(&n)),
            };

            match next {
                Ok(event) => return Some((event, (log, notices))),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream client fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("Session gone, closing event stream");
                    return None;
                }
            }
        }
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn log_event(event: LogEvent) -> Result<Event, axum::Error> {
    let name = match &event {
        LogEvent::Appended { .. } => "appended",
        LogEvent::Updated { .. } => "updated",
        LogEvent::Finalized { .. } => "finalized",
        LogEvent::Cleared => "cleared",
    };
    Event::default().event(name).json_data(&event)
}

fn notice_event(notice: &Notice) -> Result<Event, axum::Error> {
    Event::default().event("notice").json_data(notice)
}

/// GET /status
/// Session statistics
pub async fn get_status(State(state): State<AppState>) -> Response {
    match state.session.stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
