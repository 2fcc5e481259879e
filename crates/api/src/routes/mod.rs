pub mod health;
pub mod host;

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  presentation events (WebSocket)
/// /spawn                               streaming process (WebSocket)
///
/// /exec                                run to completion (POST)
/// /fullscreen                          toggle full screen (POST)
/// /toast                               show toast (POST)
/// ```
pub fn api_routes(request_timeout: Duration) -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/spawn", get(ws::spawn_handler))
        .route_layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .merge(host::router(request_timeout))
}
