//! Handlers for `exec`, full screen and toast.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ksu_bridge_core::error::CoreError;
use ksu_bridge_core::{ExecOptions, ExecResult};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireToken;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /exec`.
#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub options: ExecOptions,
}

/// Request body for `POST /fullscreen`.
#[derive(Debug, Deserialize)]
pub struct FullScreenRequest {
    pub enabled: bool,
}

/// Request body for `POST /toast`.
#[derive(Debug, Deserialize)]
pub struct ToastRequest {
    pub message: String,
}

/// Reject command strings that are empty or whitespace only.
pub fn validate_command(command: &str) -> Result<(), CoreError> {
    if command.trim().is_empty() {
        return Err(CoreError::Validation(
            "command must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Unwrap a JSON body, reporting malformed input in the API error envelope.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /exec
///
/// Run the command to completion. A failing command still answers 200; the
/// outcome is in `data.errno`.
pub async fn exec(
    State(state): State<AppState>,
    _auth: RequireToken,
    payload: Result<Json<ExecRequest>, JsonRejection>,
) -> AppResult<Json<DataResponse<ExecResult>>> {
    let input = json_body(payload)?;
    validate_command(&input.command)?;

    let result = state.host.exec(&input.command, input.options).await;
    if !result.success() {
        tracing::info!(command = %input.command, errno = result.errno, "Command failed");
    }

    Ok(Json(DataResponse { data: result }))
}

/// POST /fullscreen
pub async fn full_screen(
    State(state): State<AppState>,
    _auth: RequireToken,
    payload: Result<Json<FullScreenRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let input = json_body(payload)?;
    state.host.full_screen(input.enabled);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /toast
pub async fn toast(
    State(state): State<AppState>,
    _auth: RequireToken,
    payload: Result<Json<ToastRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let input = json_body(payload)?;
    state.host.toast(&input.message);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
