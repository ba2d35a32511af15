//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction to keep error shapes uniform
//! across inventory endpoints.
//!
//! # Key invariants and assumptions
//! - Error responses must include a stable `code` and human-readable `message`.
//! - Status codes must align with the error category.
//! - Allocation failures report the honest count of rows already committed.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use crate::serial::{BatchError, SerialError};
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build a 404 Not Found error.
pub fn api_not_found(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        body: ErrorResponse {
            code: "not_found".to_string(),
            message: message.to_string(),
            inserted: None,
        },
    }
}

/// Build a 409 Conflict error with a caller-provided code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    ApiError {
        status: StatusCode::CONFLICT,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            inserted: None,
        },
    }
}

/// Build a 500 Internal Server Error from a store error.
///
/// Logs the store error and returns a generic internal error response.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "inventory storage error");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            code: "internal".to_string(),
            message: message.to_string(),
            inserted: None,
        },
    }
}

/// Build a 401 Unauthorized error.
pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        body: ErrorResponse {
            code: "unauthorized".to_string(),
            message: message.to_string(),
            inserted: None,
        },
    }
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorResponse {
            code: "validation_error".to_string(),
            message: message.to_string(),
            inserted: None,
        },
    }
}

/// Map an allocation failure onto an HTTP error, preserving the honest count
/// of rows that were durably committed before the failure.
pub fn api_allocation_failed(err: &BatchError) -> ApiError {
    let (status, code) = match &err.source {
        SerialError::LimitExceeded => (StatusCode::CONFLICT, "serial_limit"),
        SerialError::RetriesExhausted { .. } => (StatusCode::CONFLICT, "allocation_contended"),
        SerialError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    if matches!(err.source, SerialError::Store(_)) {
        tracing::error!(error = ?err, "variant allocation failed");
    }
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
            inserted: Some(err.inserted as u64),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_helpers_build_expected_codes() {
        let not_found = api_not_found("missing");
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body.code, "not_found");

        let conflict = api_conflict("serial_limit", "sequence full");
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.body.code, "serial_limit");

        let unauthorized = api_unauthorized("nope");
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.body.code, "unauthorized");

        let validation = api_validation_error("bad");
        assert_eq!(validation.status, StatusCode::BAD_REQUEST);
        assert_eq!(validation.body.code, "validation_error");
    }

    #[test]
    fn api_internal_logs_and_wraps_store_error() {
        let err = StoreError::Unexpected(anyhow::anyhow!("boom"));
        let api = api_internal("storage failed", &err);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.code, "internal");
        assert_eq!(api.body.message, "storage failed");
    }

    #[test]
    fn allocation_failures_carry_partial_counts() {
        let contended = BatchError {
            inserted: 2,
            requested: 5,
            source: SerialError::RetriesExhausted { attempts: 5 },
        };
        let api = api_allocation_failed(&contended);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.body.code, "allocation_contended");
        assert_eq!(api.body.inserted, Some(2));

        let full = BatchError {
            inserted: 0,
            requested: 1,
            source: SerialError::LimitExceeded,
        };
        let api = api_allocation_failed(&full);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.body.code, "serial_limit");

        let broken = BatchError {
            inserted: 1,
            requested: 3,
            source: SerialError::Store(StoreError::Unexpected(anyhow::anyhow!("io"))),
        };
        let api = api_allocation_failed(&broken);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.inserted, Some(1));
    }
}
