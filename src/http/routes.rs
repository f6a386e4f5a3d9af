use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::get_status))
        // Conversation
        .route(
            "/conversation/messages",
            get(handlers::get_messages).post(handlers::send_message),
        )
        .route("/conversation/events", get(handlers::conversation_events))
        .route("/conversation/cancel", post(handlers::cancel_response))
        .route("/conversation/clear", post(handlers::clear_conversation))
        // Voice input
        .route("/voice/start", post(handlers::start_voice))
        .route("/voice/stop", post(handlers::stop_voice))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
