// Token refresh call

use reqwest::{Client, Url};

use super::session::Session;
use super::types::{RefreshOutcome, RefreshRequest, SessionToken, TokenResponse, REFRESH_PATH};
use crate::error::ApiError;
use crate::models::request::{ApiResponse, RequestDescriptor};

/// Perform exactly one refresh call and apply its outcome to `session`
///
/// On success the new token is persisted and installed before returning. On
/// denial (non-2xx status, or a body without a usable `token`) the session is
/// logged out. A transport failure leaves the session untouched and is
/// returned as-is. This never triggers another refresh, whatever the status.
pub async fn refresh_session(
    client: &Client,
    base_url: &Url,
    session: &Session,
) -> Result<RefreshOutcome, ApiError> {
    tracing::info!("Refreshing session token...");

    let mut descriptor = RequestDescriptor::post(REFRESH_PATH);
    if let Some(refresh_token) = session.refresh_token().await {
        descriptor = descriptor.json(&RefreshRequest { refresh_token })?;
    }

    let token = session.token().await;
    let response = descriptor
        .to_request(client, base_url, token.as_ref())?
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Refresh request failed to send");
            ApiError::Transport(e)
        })?;
    let response = ApiResponse::read(response).await?;

    match parse_refresh_response(&response) {
        Some((new_token, refresh_token)) => {
            tracing::info!("Session token refreshed ({})", new_token.preview());
            session.establish(new_token.clone(), refresh_token).await;
            Ok(RefreshOutcome::Refreshed(new_token))
        }
        None => {
            tracing::warn!(
                status = %response.status(),
                "Refresh denied, ending session"
            );
            session.logout().await;
            Ok(RefreshOutcome::Denied)
        }
    }
}

/// New bearer (and optional refresh) token, or `None` if the refresh was denied
fn parse_refresh_response(response: &ApiResponse) -> Option<(SessionToken, Option<String>)> {
    if !response.is_success() {
        return None;
    }

    match response.json::<TokenResponse>() {
        Ok(body) => match body.usable_token() {
            Some(token) => Some((token, body.refresh_token)),
            None => {
                tracing::debug!("Refresh response does not contain a token");
                None
            }
        },
        Err(e) => {
            tracing::debug!("Refresh response is not a token body: {}", e);
            None
        }
    }
}
