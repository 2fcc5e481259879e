//! Shared-token authentication extractor for Axum handlers.
//!
//! The bridge hands out a privileged shell, so when `API_TOKEN` is set every
//! `/api/v1` handler takes [`RequireToken`] as a parameter:
//!
//! ```ignore
//! async fn my_handler(_auth: RequireToken) -> AppResult<StatusCode> {
//!     Ok(StatusCode::NO_CONTENT)
//! }
//! ```

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Query};
use axum::http::header::{HeaderName, CONNECTION, UPGRADE};
use axum::http::request::Parts;
use ksu_bridge_core::error::CoreError;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// Marker proving the request carried the configured token (or that no token
/// is configured).
#[derive(Debug, Clone, Copy)]
pub struct RequireToken;

impl FromRequestParts<AppState> for RequireToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.api_token.as_deref() else {
            return Ok(RequireToken);
        };

        let provided = match bearer_token(parts)? {
            Some(token) => Some(token.to_owned()),
            // Browsers cannot set headers on WebSocket upgrades.
            None if is_websocket_upgrade(parts) => query_token(parts),
            None => None,
        };

        let provided = provided.ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

        if tokens_match(&provided, expected) {
            Ok(RequireToken)
        } else {
            tracing::warn!(uri = %parts.uri, "Rejected request with invalid token");
            Err(AppError::Core(CoreError::Unauthorized(
                "Invalid token".into(),
            )))
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization header".into(),
        ))
    })?;
    value.strip_prefix("Bearer ").map(Some).ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })
}

/// The percent-decoded `token` query parameter.
fn query_token(parts: &Parts) -> Option<String> {
    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri).ok()?;
    params.remove("token")
}

fn is_websocket_upgrade(parts: &Parts) -> bool {
    let header_has = |name: HeaderName, wanted: &str| {
        parts.headers.get_all(name).iter().any(|value| {
            value.to_str().is_ok_and(|v| {
                v.split(',')
                    .any(|item| item.trim().eq_ignore_ascii_case(wanted))
            })
        })
    };
    header_has(UPGRADE, "websocket") && header_has(CONNECTION, "upgrade")
}

/// Compare fixed-size digests so the comparison time does not depend on
/// where the inputs first differ.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
