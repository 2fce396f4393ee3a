//! Error types for ringfs

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Peer Errors ===
    #[error("Dial failure to {addr}: {reason}")]
    DialFailure { addr: String, reason: String },

    #[error("No ack from {addr} within {timeout:?}")]
    AckTimeout { addr: String, timeout: Duration },

    #[error("HTTP error from {addr}: {status}")]
    Http { addr: String, status: u16 },

    #[error("Malformed response from {addr}: {reason}")]
    BadResponse { addr: String, reason: String },

    // === Placement Errors ===
    #[error("Insufficient replicas: need {needed}, have {available}")]
    InsufficientReplicas { needed: usize, available: usize },

    // === Replication Errors ===
    #[error("Replication of {file} to {destination} failed: {reason}")]
    ReplicationFailed {
        file: String,
        destination: String,
        reason: String,
    },

    // === Request Errors ===
    #[error("Bad request: {0}")]
    BadRequest(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Does this error mean the peer should be considered dead?
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Error::DialFailure { .. } | Error::AckTimeout { .. })
    }

    /// Map a client-side reqwest error onto the peer error kinds
    pub fn from_reqwest(addr: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::AckTimeout {
                addr: addr.to_string(),
                timeout,
            }
        } else if err.is_connect() {
            Error::DialFailure {
                addr: addr.to_string(),
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Error::Http {
                addr: addr.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            Error::BadResponse {
                addr: addr.to_string(),
                reason: err.to_string(),
            }
        } else {
            Error::DialFailure {
                addr: addr.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::AckTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::DialFailure { .. } | Error::Http { .. } | Error::BadResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::InsufficientReplicas { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.to_http_status();
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
