use super::handlers;
use super::state::AppState;
use crate::transport;
use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Live call media stream (WebSocket upgrade)
        .route("/call/stream", get(transport::call_stream))
        // Call introspection
        .route("/calls", get(handlers::list_calls))
        .route(
            "/calls/:call_id",
            get(handlers::get_call).delete(handlers::close_call),
        )
        .route(
            "/calls/:call_id/transcript",
            get(handlers::get_call_transcript),
        )
        // Cross-call owner queries
        .route(
            "/owners/:owner_id/calls",
            delete(handlers::close_owner_calls),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
