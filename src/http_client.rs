use anyhow::Context;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::{refresh_session, RefreshOutcome, Session, SessionToken, REFRESH_PATH};
use crate::error::ApiError;
use crate::models::request::{ApiResponse, RequestDescriptor};

/// Terminal state of one request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 2xx, first attempt or replay
    Succeeded,
    /// Replay after a refresh did not succeed
    Failed,
    /// 401 and the refresh was denied
    LoggedOut,
    /// Failure returned without recovery (non-401, or a 401 from the
    /// refresh endpoint itself)
    OtherFailure,
}

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Success,
    AuthExpired,
    OtherFailure,
}

pub(crate) fn classify(status: StatusCode) -> Disposition {
    if status.is_success() {
        Disposition::Success
    } else if status == StatusCode::UNAUTHORIZED {
        Disposition::AuthExpired
    } else {
        Disposition::OtherFailure
    }
}

/// HTTP client for the music API with one-shot token refresh
///
/// - attaches the session's bearer token to every request
/// - on 401: refreshes once, then replays the request once
/// - refresh denied: logs the session out and returns the original 401
/// - anything else is returned unchanged
pub struct ApiHttpClient {
    /// Shared HTTP client with connection pooling and a cookie jar
    client: Client,

    /// API root, e.g. `http://localhost:5000/api`
    base_url: Url,

    /// Session context
    session: Arc<Session>,

    /// Held while a refresh is in flight
    refresh_gate: Mutex<()>,
}

impl ApiHttpClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        session: Arc<Session>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            session,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Execute a request, recovering once from an expired token
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let (token, generation) = self.session.snapshot().await;

        let response = self.send_once(request, token.as_ref(), 1).await?;
        match classify(response.status()) {
            Disposition::Success => {
                log_outcome(request, RequestOutcome::Succeeded, response.status());
                return Ok(response);
            }
            Disposition::OtherFailure => {
                log_outcome(request, RequestOutcome::OtherFailure, response.status());
                return Err(response.into_error());
            }
            Disposition::AuthExpired if request.path() == REFRESH_PATH => {
                log_outcome(request, RequestOutcome::OtherFailure, response.status());
                return Err(response.into_error());
            }
            Disposition::AuthExpired => {}
        }

        tracing::warn!(
            request_id = %request.id(),
            path = %request.path(),
            "Received 401, attempting token refresh"
        );

        let Some(new_token) = self.recover(generation).await? else {
            log_outcome(request, RequestOutcome::LoggedOut, response.status());
            return Err(response.into_error());
        };

        let retried = self.send_once(request, Some(&new_token), 2).await?;
        if retried.is_success() {
            log_outcome(request, RequestOutcome::Succeeded, retried.status());
            Ok(retried)
        } else {
            log_outcome(request, RequestOutcome::Failed, retried.status());
            Err(retried.into_error())
        }
    }

    /// Issue a single refresh call
    ///
    /// Shares the in-flight guard with [`ApiHttpClient::execute`].
    pub async fn refresh(&self) -> Result<RefreshOutcome, ApiError> {
        let _gate = self.refresh_gate.lock().await;
        refresh_session(&self.client, &self.base_url, &self.session).await
    }

    /// Token to replay with after a 401 seen at `generation`, or `None` if
    /// the session has ended
    ///
    /// Requests that failed together share one refresh: whoever takes the gate
    /// first refreshes, the rest see the session moved on and reuse its result.
    async fn recover(&self, generation: u64) -> Result<Option<SessionToken>, ApiError> {
        let _gate = self.refresh_gate.lock().await;

        let (current, now) = self.session.snapshot().await;
        if now != generation {
            tracing::debug!(
                sent_with = generation,
                current = now,
                "Session changed since the request was sent, skipping refresh"
            );
            return Ok(current);
        }

        match refresh_session(&self.client, &self.base_url, &self.session).await? {
            RefreshOutcome::Refreshed(token) => Ok(Some(token)),
            RefreshOutcome::Denied => Ok(None),
        }
    }

    /// One network round trip, no recovery
    async fn send_once(
        &self,
        request: &RequestDescriptor,
        token: Option<&SessionToken>,
        attempt: u32,
    ) -> Result<ApiResponse, ApiError> {
        let url = request.url(&self.base_url)?;
        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            url = %url,
            attempt = attempt,
            authenticated = token.is_some(),
            "Sending HTTP request"
        );

        let builder = request.to_request(&self.client, &self.base_url, token)?;
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    request_id = %request.id(),
                    error_kind = error_kind(&e),
                    error = %e,
                    url = %url,
                    attempt = attempt,
                    "HTTP request error"
                );
                return Err(ApiError::Transport(e));
            }
        };

        let response = ApiResponse::read(response).await?;
        tracing::debug!(
            request_id = %request.id(),
            status = %response.status(),
            attempt = attempt,
            "Received HTTP response"
        );
        Ok(response)
    }
}

fn log_outcome(request: &RequestDescriptor, outcome: RequestOutcome, status: StatusCode) {
    match outcome {
        RequestOutcome::Succeeded => tracing::debug!(
            request_id = %request.id(),
            path = %request.path(),
            status = %status,
            outcome = ?outcome,
            "Request finished"
        ),
        _ => tracing::warn!(
            request_id = %request.id(),
            path = %request.path(),
            status = %status,
            outcome = ?outcome,
            "Request failed"
        ),
    }
}

/// Categorize a transport error for logging
fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}
