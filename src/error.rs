// Error handling module
// Defines the error taxonomy returned by the API client

use thiserror::Error;

/// Errors that can occur while talking to the music API
#[derive(Error, Debug)]
pub enum ApiError {
    /// The presented credential was missing, invalid or expired (HTTP 401)
    #[error("Authorization expired: {message}")]
    AuthExpired { message: String },

    /// The refresh endpoint did not hand out a usable token
    #[error("Session refresh denied")]
    RefreshDenied,

    /// Connection-level failure (DNS, connect, timeout, body read)
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other non-success status from the API
    #[error("API error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Caller supplied input that cannot form a request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Build the error matching a non-success HTTP status
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 401 {
            ApiError::AuthExpired { message }
        } else {
            ApiError::Http { status, message }
        }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthExpired { .. } => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the error means the user has to log in again
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthExpired { .. } | ApiError::RefreshDenied)
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
