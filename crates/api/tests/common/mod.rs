#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use rebate_core::service::{Backends, RebateService, ServiceConfig};
use rebate_events::EventBus;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use rebate_api::config::{ServerConfig, StorageBackend};
use rebate_api::middleware::actor::ACTOR_HEADER;
use rebate_api::router::build_app_router;
use rebate_api::state::AppState;

/// Build a test `ServerConfig` using in-memory storage.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        storage: StorageBackend::Memory,
        database_url: None,
        service: ServiceConfig::default(),
    }
}

/// State over freshly seeded demo data. Each call is fully isolated.
pub async fn test_state() -> AppState {
    test_state_with(Backends::in_memory_demo()).await
}

/// State over caller-supplied backends, seeded like production.
pub async fn test_state_with(backends: Backends) -> AppState {
    let config = test_config();
    let service = RebateService::new(backends, config.service.clone());
    service.initialize().await.unwrap();
    AppState {
        service: Arc::new(service),
        config: Arc::new(config),
        event_bus: Arc::new(EventBus::default()),
        pool: None,
        shutdown: CancellationToken::new(),
    }
}

pub fn build_app(state: AppState) -> Router {
    let config = test_config();
    build_app_router(state, &config)
}

/// Full application router with the production middleware stack.
pub async fn build_test_app() -> Router {
    build_app(test_state().await)
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

fn json_request(method: Method, uri: &str, body: &Value, actor: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, json_request(Method::POST, uri, &body, None)).await
}

pub async fn post_json_as(app: Router, uri: &str, body: Value, actor: &str) -> Response {
    send(app, json_request(Method::POST, uri, &body, Some(actor))).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, json_request(Method::PUT, uri, &body, None)).await
}

/// POST with no body at all.
pub async fn post_empty(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
