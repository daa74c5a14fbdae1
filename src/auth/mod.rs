// Authentication module
// Session context, token persistence and the refresh call

mod refresh;
mod session;
mod store;
mod types;

pub use refresh::refresh_session;
pub use session::Session;
pub use store::{MemoryTokenStore, SqliteTokenStore, TokenStore};
pub use types::{
    RefreshOutcome, SessionState, SessionToken, TokenResponse, AUTH_TOKEN_KEY, REFRESH_PATH,
    REFRESH_TOKEN_KEY,
};
