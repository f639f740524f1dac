use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Culinair - recipe sharing from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Backend origin, e.g. https://xyz.culinair.app
    #[arg(short = 'u', long, env = "CULINAIR_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Public (anon) API key sent with every request
    #[arg(short = 'k', long, env = "CULINAIR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to the local session store
    #[arg(long, env = "CULINAIR_STORE_FILE")]
    pub store_file: Option<String>,

    /// Passphrase used to encrypt the local session store
    #[arg(long, env = "CULINAIR_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account (a confirmation code is emailed unless auto-confirm is on)
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Confirm a sign-up with the emailed code
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },

    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in with a Google ID token
    SignInGoogle {
        #[arg(long)]
        id_token: String,
        #[arg(long)]
        nonce: Option<String>,
    },

    /// Sign out and forget the stored session
    SignOut,

    /// Show the signed-in user's profile
    Whoami,

    /// Browse a recipe feed
    Feed {
        #[arg(value_enum, default_value = "public")]
        kind: FeedArg,
        #[arg(long, default_value = "20")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Show one recipe
    Recipe { id: String },

    /// Show the comment thread of a recipe
    Comments { recipe_id: String },

    /// Comment on a recipe, optionally replying to another comment
    Comment {
        recipe_id: String,
        content: String,
        #[arg(long)]
        reply_to: Option<String>,
    },

    Like { recipe_id: String },
    Unlike { recipe_id: String },
    Save { recipe_id: String },
    Unsave { recipe_id: String },

    /// List saved recipes
    Saved,

    Follow { user_id: String },
    Unfollow { user_id: String },

    /// List recent notifications
    Notifications {
        #[arg(long, default_value = "20")]
        limit: u32,
        /// Mark everything as read afterwards
        #[arg(long)]
        mark_read: bool,
    },

    /// Register this device's push token
    RegisterPush {
        token: String,
        #[arg(long, default_value = "cli")]
        platform: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum FeedArg {
    Public,
    Following,
    Trending,
    Recommended,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub backend_url: String,
    pub api_key: String,

    // Local storage
    pub store_file: PathBuf,
    pub store_key: Option<String>,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Repositories
    pub profile_wait_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Resolve configuration with priority: CLI > ENV > defaults
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = Config {
            backend_url: args
                .backend_url
                .clone()
                .or_else(|| std::env::var("CULINAIR_BACKEND_URL").ok())
                .context(
                    "CULINAIR_BACKEND_URL is required (use -u or set CULINAIR_BACKEND_URL env var)",
                )?,

            api_key: args
                .api_key
                .clone()
                .or_else(|| std::env::var("CULINAIR_API_KEY").ok())
                .context("CULINAIR_API_KEY is required (use -k or set CULINAIR_API_KEY env var)")?,

            store_file: args
                .store_file
                .as_deref()
                .map(expand_tilde)
                .unwrap_or_else(default_store_file),

            store_key: args.store_key.clone().filter(|k| !k.is_empty()),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_request_timeout: args.http_timeout,

            profile_wait_timeout: std::env::var("PROFILE_WAIT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            log_level: args.log_level.clone(),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.backend_url)
            .with_context(|| format!("CULINAIR_BACKEND_URL is not a valid URL: {}", self.backend_url))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            anyhow::bail!(
                "CULINAIR_BACKEND_URL must use http or https, got: {}",
                url.scheme()
            );
        }

        if self.api_key.trim().is_empty() {
            anyhow::bail!("CULINAIR_API_KEY cannot be empty");
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Default store location inside the platform data directory
fn default_store_file() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("culinair").join("session.sqlite3"))
        .unwrap_or_else(|| PathBuf::from("culinair-session.sqlite3"))
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
