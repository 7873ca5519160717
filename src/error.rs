//! Gateway error taxonomy and its HTTP mapping
//!
//! Every handler returns `Result<_, GatewayError>`; `into_response` is the
//! only place an error becomes a status code and JSON body.

use crate::backend::BackendError;
use crate::core::{AddressError, Address, TransactionError};
use crate::crypto::KeyError;
use crate::history::CursorError;
use crate::subscription::SubscriptionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("subscription {id} not found for {address}")]
    SubscriptionNotFound { address: Address, id: u64 },
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("invalid cursor: {0}")]
    CursorInvalid(String),
    #[error("invalid callback url: {0}")]
    InvalidUrl(String),
    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("no response from collaborator within {0:?}")]
    Timeout(Duration),
    #[error("resource not found")]
    InvalidRoute,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Uniform JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub timestamp: i64,
    pub error: &'static str,
    pub message: String,
}

impl GatewayError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::SubscriptionNotFound { .. } => "SUBSCRIPTION_NOT_FOUND",
            GatewayError::Duplicate(_) => "DUPLICATE",
            GatewayError::CursorInvalid(_) => "CURSOR_INVALID",
            GatewayError::InvalidUrl(_) => "INVALID_URL",
            GatewayError::BroadcastFailed(_) => "BROADCAST_FAILED",
            GatewayError::Upstream(_) => "UPSTREAM_ERROR",
            GatewayError::Timeout(_) => "GATEWAY_TIMEOUT",
            GatewayError::InvalidRoute => "INVALID_ROUTE",
            GatewayError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_)
            | GatewayError::CursorInvalid(_)
            | GatewayError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_)
            | GatewayError::SubscriptionNotFound { .. }
            | GatewayError::InvalidRoute => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Duplicate(_) => StatusCode::CONFLICT,
            GatewayError::BroadcastFailed(_) | GatewayError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status().as_u16(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            error: self.code(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self.status() {
            s if s.is_server_error() => log::warn!("{}: {}", self.code(), self),
            _ => log::debug!("{}: {}", self.code(), self),
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => GatewayError::NotFound(what),
            BackendError::Duplicate(what) => GatewayError::Duplicate(what),
            BackendError::Rejected(reason) => GatewayError::Validation(reason),
            BackendError::Unavailable(reason) | BackendError::Upstream(reason) => {
                GatewayError::Upstream(reason)
            }
        }
    }
}

impl From<TransactionError> for GatewayError {
    fn from(err: TransactionError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<AddressError> for GatewayError {
    fn from(err: AddressError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<KeyError> for GatewayError {
    fn from(err: KeyError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<CursorError> for GatewayError {
    fn from(err: CursorError) -> Self {
        GatewayError::CursorInvalid(err.to_string())
    }
}

impl From<SubscriptionError> for GatewayError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::InvalidUrl(reason) => GatewayError::InvalidUrl(reason),
            SubscriptionError::InvalidWindow { .. } => GatewayError::Validation(err.to_string()),
            SubscriptionError::NotFound { address, id } => {
                GatewayError::SubscriptionNotFound { address, id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (GatewayError::Validation("x".into()), "VALIDATION_ERROR", 400),
            (GatewayError::NotFound("tx".into()), "NOT_FOUND", 404),
            (GatewayError::Duplicate("wallet".into()), "DUPLICATE", 409),
            (GatewayError::CursorInvalid("stale".into()), "CURSOR_INVALID", 400),
            (GatewayError::InvalidUrl("ftp://x".into()), "INVALID_URL", 400),
            (GatewayError::Timeout(Duration::from_secs(1)), "GATEWAY_TIMEOUT", 504),
            (GatewayError::InvalidRoute, "INVALID_ROUTE", 404),
            (GatewayError::MethodNotAllowed, "METHOD_NOT_ALLOWED", 405),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status().as_u16(), status);
        }
    }

    #[test]
    fn test_invalid_route_body() {
        let body = GatewayError::InvalidRoute.body();
        assert_eq!(body.status, 404);
        assert_eq!(body.error, "INVALID_ROUTE");
        assert_eq!(body.message, "resource not found");
        assert!(body.timestamp > 0);
    }

    #[test]
    fn test_backend_error_mapping() {
        let err: GatewayError = BackendError::Duplicate("wallet 'a'".into()).into();
        assert_eq!(err.code(), "DUPLICATE");
        let err: GatewayError = BackendError::Unavailable("down".into()).into();
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        let err: GatewayError = BackendError::Rejected("stale nonce".into()).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
