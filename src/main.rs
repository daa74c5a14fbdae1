use anyhow::Result;
use std::sync::Arc;

use music_client::api::MusicApi;
use music_client::auth::{RefreshOutcome, Session, SessionState, SqliteTokenStore};
use music_client::config::{self, Command, Config};
use music_client::error::ApiError;
use music_client::http_client::ApiHttpClient;
use music_client::models::song::{Song, SongUpload};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("API base URL: {}", config.base_url);
    tracing::debug!("Token store: {}", config.token_db.display());

    let store = Arc::new(SqliteTokenStore::open(&config.token_db)?);
    let session = Arc::new(Session::load(store)?);
    watch_session(&session);

    let http_client = Arc::new(ApiHttpClient::new(
        &config.base_url,
        session.clone(),
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let api = MusicApi::new(http_client);

    match run(&api, command).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_auth_failure() => {
            anyhow::bail!("{}\nRun `music-client login` to sign in again.", e)
        }
        Err(e) => Err(e.into()),
    }
}

/// Dispatch one subcommand
async fn run(api: &MusicApi, command: Command) -> Result<(), ApiError> {
    match command {
        Command::Login { email, password } => {
            let password = config::password_or_prompt(password)?;
            api.login(&email, &password).await?;
            println!("Logged in as {}", email);
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            let password = config::password_or_prompt(password)?;
            let body = api.signup(&name, &email, &password).await?;
            if body.usable_token().is_some() {
                println!("Account created, logged in as {}", email);
            } else {
                println!("Account created, run `music-client login` to sign in");
            }
        }
        Command::Logout => {
            api.logout().await;
            println!("Logged out");
        }
        Command::Refresh => match api.refresh_token().await? {
            RefreshOutcome::Refreshed(token) => {
                println!("Session refreshed ({})", token.preview())
            }
            RefreshOutcome::Denied => return Err(ApiError::RefreshDenied),
        },
        Command::Status => match api.session().token().await {
            Some(token) => println!("Authenticated ({})", token.preview()),
            None => println!("Not logged in"),
        },
        Command::Songs => print_songs(&api.fetch_songs().await?)?,
        Command::Album { album_id } => print_songs(&api.fetch_songs_in_album(&album_id).await?)?,
        Command::Upload {
            file,
            title,
            artist,
            album,
        } => {
            let mut upload = SongUpload::from_path(&file)?;
            upload.title = title;
            upload.artist = artist;
            upload.album_id = album;
            let name = upload.file_name.clone();
            api.upload_song(upload).await?;
            println!("Uploaded {}", name);
        }
        Command::Delete { song_id } => {
            api.delete_song(&song_id).await?;
            println!("Deleted {}", song_id);
        }
        Command::Like { song_id } => {
            api.like_song(&song_id).await?;
            println!("Liked {}", song_id);
        }
        Command::Dislike { song_id } => {
            api.dislike_song(&song_id).await?;
            println!("Disliked {}", song_id);
        }
    }

    Ok(())
}

fn print_songs(songs: &[Song]) -> Result<(), ApiError> {
    if songs.is_empty() {
        println!("No songs available");
        return Ok(());
    }

    let json = serde_json::to_string_pretty(songs)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to render songs: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Report when the session ends mid-command
fn watch_session(session: &Session) {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if *rx.borrow_and_update() == SessionState::LoggedOut {
                tracing::info!("Session ended, stored token cleared");
            }
        }
    });
}
