// Authentication types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage slot holding the current bearer token
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Storage slot holding the refresh token, when the backend hands one out
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/users/refresh-token";

/// Number of characters shown by [`SessionToken::preview`]
const PREVIEW_LEN: usize = 8;

/// Opaque bearer credential
///
/// `Debug` never prints the full value so tokens can't leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for log lines
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(PREVIEW_LEN).collect();
        if self.0.chars().count() > PREVIEW_LEN {
            format!("{}...", head)
        } else {
            head
        }
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.preview())
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Result of a single refresh call
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The endpoint issued a new bearer token
    Refreshed(SessionToken),
    /// No usable token came back; the session must end
    Denied,
}

/// Session state broadcast to the rest of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    LoggedOut,
}

/// Refresh request body, sent only when a refresh token is held locally
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token-bearing body returned by login, signup and refresh
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// The bearer token, if present and non-empty
    pub fn usable_token(&self) -> Option<SessionToken> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(SessionToken::new)
    }
}
