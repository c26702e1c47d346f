//! Test utilities and common setup.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, header};
use axum::response::Response;
use chatrelay::api::{self, AppState};
use chatrelay::config::AppConfig;
use serde_json::Value;

/// Create a test application pointed at `backend_url`, or with no backend
/// configured when `None`.
pub fn test_app(backend_url: Option<String>) -> Router {
    let mut config = AppConfig::default();
    config.backend.url = backend_url;
    let state = AppState::from_config(&config).unwrap();
    api::create_router(state)
}

pub fn post_chat(body: Value) -> Request<Body> {
    Request::builder()
        .uri("/chat")
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(Method::GET)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Decode every `data:` record of an SSE body.
pub async fn sse_frames(response: Response) -> Vec<Value> {
    body_text(response)
        .await
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

/// A backend SSE reply body.
pub fn upstream_sse(body: &str) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
}
