use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use super::store::{MemoryTokenStore, TokenStore};
use super::types::{SessionState, SessionToken, AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Explicit session context
///
/// Holds the current bearer token (and refresh token, if any), mirrors every
/// change into the [`TokenStore`], and broadcasts [`SessionState`] changes.
/// The in-memory copy is authoritative for the running process; persistence
/// failures are logged and do not block an update.
pub struct Session {
    /// Backing persistent slots
    store: Arc<dyn TokenStore>,

    /// Current credentials
    inner: RwLock<SessionInner>,

    /// Authenticated / logged-out broadcast
    state_tx: watch::Sender<SessionState>,
}

#[derive(Default)]
struct SessionInner {
    token: Option<SessionToken>,
    refresh_token: Option<String>,
    /// Bumped on every establish/logout
    generation: u64,
}

impl Session {
    /// Restore a session from the store's persisted slots
    pub fn load(store: Arc<dyn TokenStore>) -> Result<Self> {
        let token = store.load(AUTH_TOKEN_KEY)?.map(SessionToken::from);
        let refresh_token = store.load(REFRESH_TOKEN_KEY)?;

        match token {
            Some(ref t) => tracing::debug!("Restored session token {}", t.preview()),
            None => tracing::debug!("No stored session token"),
        }

        let state = if token.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::LoggedOut
        };
        let (state_tx, _) = watch::channel(state);

        Ok(Self {
            store,
            inner: RwLock::new(SessionInner {
                token,
                refresh_token,
                generation: 0,
            }),
            state_tx,
        })
    }

    /// Fresh, empty session backed by a [`MemoryTokenStore`]
    pub fn in_memory() -> Self {
        let (state_tx, _) = watch::channel(SessionState::LoggedOut);
        Self {
            store: Arc::new(MemoryTokenStore::new()),
            inner: RwLock::new(SessionInner::default()),
            state_tx,
        }
    }

    /// Current bearer token
    pub async fn token(&self) -> Option<SessionToken> {
        self.inner.read().await.token.clone()
    }

    /// Current refresh token
    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.refresh_token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.token.is_some()
    }

    /// Token together with the generation it belongs to
    pub async fn snapshot(&self) -> (Option<SessionToken>, u64) {
        let inner = self.inner.read().await;
        (inner.token.clone(), inner.generation)
    }

    /// Watch session state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Latest broadcast state
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Install a new bearer token (login or successful refresh)
    ///
    /// A `None` refresh token keeps the one already held.
    pub async fn establish(&self, token: SessionToken, refresh_token: Option<String>) {
        {
            // Store and memory change under one guard so they never disagree
            let mut inner = self.inner.write().await;

            if let Err(e) = self.store.save(AUTH_TOKEN_KEY, token.as_str()) {
                tracing::error!("Failed to persist session token: {:#}", e);
            }
            if let Some(ref r) = refresh_token {
                if let Err(e) = self.store.save(REFRESH_TOKEN_KEY, r) {
                    tracing::error!("Failed to persist refresh token: {:#}", e);
                }
            }

            tracing::debug!("Session token set to {}", token.preview());
            inner.token = Some(token);
            if refresh_token.is_some() {
                inner.refresh_token = refresh_token;
            }
            inner.generation += 1;
            self.state_tx.send_replace(SessionState::Authenticated);
        }
    }

    /// Clear all credentials and broadcast the logout
    pub async fn logout(&self) {
        {
            let mut inner = self.inner.write().await;

            for key in [AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY] {
                if let Err(e) = self.store.remove(key) {
                    tracing::error!("Failed to clear '{}' from token store: {:#}", key, e);
                }
            }

            inner.token = None;
            inner.refresh_token = None;
            inner.generation += 1;
            self.state_tx.send_replace(SessionState::LoggedOut);
        }

        tracing::info!("Session logged out");
    }
}
