#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use ksu_bridge_core::{HostConfig, HostRuntime, LocalHost};
use ksu_bridge_events::EventBus;
use tower::ServiceExt;

use ksu_bridge_api::config::ServerConfig;
use ksu_bridge_api::presentation::PresentationRouter;
use ksu_bridge_api::router::build_app_router;
use ksu_bridge_api::state::AppState;
use ksu_bridge_api::ws::WsManager;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout and no token.
pub fn test_config(webui_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        webui_dir: webui_dir.to_path_buf(),
        api_token: None,
        host_runtime: HostConfig::default(),
    }
}

/// Everything a test needs to poke at the running application.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Keeps the static web UI directory alive for the test's duration.
    pub webui: tempfile::TempDir,
}

/// Build the full application router, exactly as `main.rs` does, backed by
/// a [`LocalHost`] publishing onto a fresh event bus. The presentation
/// router is spawned too, so this must run inside a Tokio runtime.
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {})
}

/// Same as [`build_test_app`], letting the caller adjust the config first.
pub fn build_test_app_with(customize: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let webui = tempfile::tempdir().expect("create webui dir");
    std::fs::write(webui.path().join("index.html"), "<div id=\"app\"></div>")
        .expect("write index.html");

    let mut config = test_config(webui.path());
    customize(&mut config);

    let event_bus = Arc::new(EventBus::default());
    let host: Arc<dyn HostRuntime> = Arc::new(LocalHost::new(
        config.host_runtime.clone(),
        Arc::clone(&event_bus),
    ));

    let ws_manager = Arc::new(WsManager::new());
    tokio::spawn(PresentationRouter::new(Arc::clone(&ws_manager)).run(event_bus.subscribe()));

    let state = AppState {
        config: Arc::new(config.clone()),
        host,
        ws_manager,
        event_bus,
    };

    let router = build_app_router(state.clone(), &config).expect("build router");
    TestApp {
        router,
        state,
        webui,
    }
}

/// Serve the router on an ephemeral local port (for WebSocket tests).
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_json_auth(app, uri, body, None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("response body should be JSON")
}
