use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Password;
use std::path::PathBuf;

/// Default API root of the music player backend
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Music client - command line access to the music player API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// API base URL
    #[arg(short = 'u', long, env = "MUSIC_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Path to the SQLite file holding the session token
    #[arg(short = 'd', long, env = "MUSIC_TOKEN_DB")]
    pub token_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        email: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Exchange the refresh credential for a new session token
    Refresh,
    /// Show whether a session token is stored
    Status,
    /// List all songs
    Songs,
    /// List the songs of an album
    Album { album_id: String },
    /// Upload an audio file
    Upload {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
    },
    /// Delete a song
    Delete { song_id: String },
    /// Like a song
    Like { song_id: String },
    /// Dislike a song
    Dislike { song_id: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub base_url: String,

    // Session storage
    pub token_db: PathBuf,

    // HTTP client
    pub http_request_timeout: u64,
    pub http_connect_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load `.env`, parse the command line, and build the configuration
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args);
        Ok((config, args.command))
    }

    pub fn from_args(args: &CliArgs) -> Self {
        Config {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            token_db: args
                .token_db
                .as_deref()
                .map(expand_tilde)
                .unwrap_or_else(default_token_db),
            http_request_timeout: args.http_timeout,
            http_connect_timeout: args.connect_timeout,
            log_level: args.log_level.clone(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("MUSIC_API_BASE_URL is not a valid URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("MUSIC_API_BASE_URL must use http or https: {}", self.base_url);
        }

        if self.http_request_timeout == 0 || self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }

        Ok(())
    }
}

/// `<data dir>/music-client/session.sqlite3`
fn default_token_db() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("music-client")
        .join("session.sqlite3")
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Use `given`, or ask for a password interactively
pub fn password_or_prompt(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }

    let password: String = Password::new()
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")?;

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}
