// ABOUTME: Error types for the server RPC transport

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Classify a request failure from reqwest.
    pub(crate) fn from_send(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::Unreachable(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}
