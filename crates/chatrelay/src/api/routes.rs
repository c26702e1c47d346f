//! API route definitions.

use axum::http::{Method, header};
use axum::{
    Router,
    routing::{MethodRouter, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Tracing layer with request IDs and timing
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", with_cors(get(handlers::health), Method::GET))
        .route("/chat", with_cors(post(handlers::chat), Method::POST))
        .route("/chat/info", with_cors(get(handlers::chat_info), Method::GET))
        .route(
            "/chat/messages/{message_id}/processing",
            with_cors(get(handlers::message_processing), Method::GET),
        )
        .route(
            "/chat/messages/{message_id}/cache",
            with_cors(get(handlers::message_cache), Method::GET),
        )
        .layer(trace_layer)
        .with_state(state)
}

/// Each endpoint advertises only its own method. The layer wraps the
/// method fallback too, so `OPTIONS` preflights are answered here.
fn with_cors(route: MethodRouter<AppState>, method: Method) -> MethodRouter<AppState> {
    route.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([method])
            .allow_headers([header::CONTENT_TYPE]),
    )
}
