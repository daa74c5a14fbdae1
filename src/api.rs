// Typed endpoints of the music API

use std::sync::Arc;

use crate::auth::{RefreshOutcome, Session, TokenResponse};
use crate::error::ApiError;
use crate::http_client::ApiHttpClient;
use crate::models::request::RequestDescriptor;
use crate::models::song::{Song, SongList, SongUpload};
use crate::models::user::{LoginRequest, SignupRequest};

/// User and song endpoints, all routed through [`ApiHttpClient`]
#[derive(Clone)]
pub struct MusicApi {
    http: Arc<ApiHttpClient>,
}

impl MusicApi {
    pub fn new(http: Arc<ApiHttpClient>) -> Self {
        Self { http }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.http.session()
    }

    /// Log in and store the returned token
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let request = RequestDescriptor::post("/users/login").json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;

        let body: TokenResponse = self.http.execute(&request).await?.json()?;
        let token = body.usable_token().ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!("Login response does not contain a token"))
        })?;

        tracing::info!("Logged in as {}", email);
        self.session()
            .establish(token, body.refresh_token.clone())
            .await;
        Ok(body)
    }

    /// Create an account; the session is established when the backend
    /// answers with a token
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        let request = RequestDescriptor::post("/users").json(&SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;

        let response = self.http.execute(&request).await?;
        let body: TokenResponse = if response.body().is_empty() {
            TokenResponse::default()
        } else {
            response.json()?
        };

        if let Some(token) = body.usable_token() {
            self.session()
                .establish(token, body.refresh_token.clone())
                .await;
        }
        Ok(body)
    }

    /// Explicit refresh; a denial has already logged the session out
    pub async fn refresh_token(&self) -> Result<RefreshOutcome, ApiError> {
        self.http.refresh().await
    }

    pub async fn upload_song(&self, upload: SongUpload) -> Result<(), ApiError> {
        if upload.bytes.is_empty() {
            return Err(ApiError::Validation(format!(
                "Audio file {} is empty",
                upload.file_name
            )));
        }

        let request = RequestDescriptor::post("/songs/upload").multipart(upload.into_parts());
        self.http.execute(&request).await?;
        Ok(())
    }

    pub async fn fetch_songs(&self) -> Result<Vec<Song>, ApiError> {
        let list: SongList = self
            .http
            .execute(&RequestDescriptor::get("/songs"))
            .await?
            .json()?;
        Ok(list.into())
    }

    pub async fn fetch_songs_in_album(&self, album_id: &str) -> Result<Vec<Song>, ApiError> {
        let request = RequestDescriptor::get("/songs/album").segment(non_empty("album id", album_id)?);
        let list: SongList = self.http.execute(&request).await?.json()?;
        Ok(list.into())
    }

    pub async fn delete_song(&self, song_id: &str) -> Result<(), ApiError> {
        let request = RequestDescriptor::delete("/songs").segment(non_empty("song id", song_id)?);
        self.http.execute(&request).await?;
        Ok(())
    }

    pub async fn like_song(&self, song_id: &str) -> Result<(), ApiError> {
        self.song_action(song_id, "like").await
    }

    pub async fn dislike_song(&self, song_id: &str) -> Result<(), ApiError> {
        self.song_action(song_id, "dislike").await
    }

    async fn song_action(&self, song_id: &str, action: &str) -> Result<(), ApiError> {
        let request = RequestDescriptor::post("/songs")
            .segment(non_empty("song id", song_id)?)
            .segment(action);
        self.http.execute(&request).await?;
        Ok(())
    }

    /// Local logout; the backend keeps no per-client state to clear
    pub async fn logout(&self) {
        self.session().logout().await;
    }
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::Validation(format!("{} must not be empty", what)))
    } else {
        Ok(trimmed)
    }
}
