//! Route definitions for the host capability endpoints.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::host;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// POST   /exec        -> exec
/// POST   /fullscreen  -> full_screen
/// POST   /toast       -> toast
/// ```
///
/// `request_timeout` bounds every route except `/exec`, which answers with
/// an `ExecResult` however long the command runs (its own deadline is
/// `EXEC_TIMEOUT_SECS`, reported in-band as errno 124).
pub fn router(request_timeout: Duration) -> Router<AppState> {
    Router::new()
        .route("/fullscreen", post(host::full_screen))
        .route("/toast", post(host::toast))
        .route_layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .route("/exec", post(host::exec))
}
