//! Static API token check.
//!
//! # Purpose
//! Gates the variant endpoints behind a shared bearer token when one is
//! configured. Real per-user authentication is delegated to the platform in
//! front of this service; this check only keeps unauthenticated traffic out
//! of direct deployments.
use crate::api::error::{api_unauthorized, ApiError};
use crate::app::AppState;
use axum::http::{header, HeaderMap};

/// Verify the `Authorization: Bearer` header against the configured token.
///
/// A deployment without a configured token (local development, tests) accepts
/// every request.
pub(crate) fn require_api_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(());
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(api_unauthorized("missing or invalid api token")),
    }
}
