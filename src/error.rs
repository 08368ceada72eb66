//! Error taxonomy for the transport.
//!
//! # Categories
//! - Admission: host/origin, rate limit, authorization (plain HTTP statuses)
//! - Session: missing or unknown session (JSON-RPC envelope, HTTP 400)
//! - Timeout: reply or enqueue not completed in time (HTTP 408)
//! - Configuration: OAuth enabled without its secret (HTTP 500, never 401)
//!
//! Nothing here retries; retry policy belongs to the client.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::json_rpc_error;
use crate::protocol::{DecodeError, RequestId, SESSION_ERROR_CODE};
use crate::security::host_guard::HostGuardError;

/// Failures of the duplex [`Connection`](crate::session::Connection).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("reply for request {0} already delivered")]
    DuplicateReply(RequestId),

    #[error("request {0} is already in flight")]
    DuplicatePending(RequestId),
}

/// Session resolution failures, reported as JSON-RPC errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Missing session ID")]
    Missing,

    #[error("Session not found or expired")]
    Unknown,
}

/// Everything a transport handler can fail with, mapped onto HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("host or origin rejected: {0}")]
    HostRejected(#[from] HostGuardError),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("unauthorized: {reason}")]
    Unauthorized {
        reason: String,
        /// URL of the protected-resource metadata document.
        resource_metadata: String,
    },

    #[error("authorization misconfigured: {0}")]
    AuthMisconfigured(String),

    #[error(transparent)]
    Malformed(#[from] DecodeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportError::HostRejected(_) => StatusCode::BAD_REQUEST,
            TransportError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            TransportError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            TransportError::AuthMisconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TransportError::Malformed(_) => StatusCode::BAD_REQUEST,
            TransportError::Session(_) => StatusCode::BAD_REQUEST,
            TransportError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            TransportError::Connection(ConnectionError::Cancelled) => StatusCode::REQUEST_TIMEOUT,
            TransportError::Connection(ConnectionError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            TransportError::Connection(_) => StatusCode::CONFLICT,
            TransportError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            TransportError::Session(e) => json_rpc_error(status, SESSION_ERROR_CODE, &e.to_string()),
            TransportError::Malformed(e) => json_rpc_error(status, e.code(), &e.to_string()),
            TransportError::Unauthorized {
                reason,
                resource_metadata,
            } => {
                let challenge = format!("Bearer resource_metadata=\"{}\"", resource_metadata);
                let mut response = (status, reason).into_response();
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
                response
            }
            // Operators see the detail in logs, clients only the category.
            TransportError::AuthMisconfigured(_) => {
                (status, "Authorization is misconfigured").into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(TransportError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            TransportError::AuthMisconfigured("no secret".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(TransportError::Timeout("reply").status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            TransportError::from(ConnectionError::Cancelled).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(TransportError::from(SessionError::Unknown).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = TransportError::Unauthorized {
            reason: "missing bearer token".into(),
            resource_metadata: "http://localhost:8081/.well-known/oauth-protected-resource".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert_eq!(
            challenge,
            "Bearer resource_metadata=\"http://localhost:8081/.well-known/oauth-protected-resource\""
        );
    }
}
