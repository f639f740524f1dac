use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Password;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use culinair_client::auth::{SessionEvent, SignUpOutcome};
use culinair_client::comment_tree::flatten_thread;
use culinair_client::config::{CliArgs, Command, Config, FeedArg};
use culinair_client::models::{FeedKind, Page};
use culinair_client::Culinair;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = Config::from_args(&args)?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(backend = %config.backend_url, "Configuration loaded");

    let app = Culinair::new(config)?;

    // Subscribed before the command runs so a forced sign-out during it is seen
    let mut expired = app.events.subscribe();
    let result = run(&app, args.command).await;

    if expired_during_command(&mut expired) {
        tracing::warn!("🔒 Session expired, please sign in again");
    }

    result
}

/// Whether an expiry was broadcast since `rx` subscribed
fn expired_during_command(rx: &mut broadcast::Receiver<SessionEvent>) -> bool {
    matches!(
        rx.try_recv(),
        Ok(SessionEvent::Expired) | Err(TryRecvError::Lagged(_))
    )
}

async fn run(app: &Culinair, command: Command) -> Result<()> {
    match command {
        Command::SignUp {
            email,
            username,
            password,
        } => {
            let password = password_or_prompt(password, true)?;
            match app.session.sign_up(&email, &password, &username).await? {
                SignUpOutcome::ConfirmationRequired { user_id } => {
                    tracing::info!(%user_id, "📧 Check your inbox for a confirmation code");
                    println!("Confirmation code sent to {}", email);
                }
                SignUpOutcome::SignedIn(session) => {
                    welcome(app, &session.user_id).await?;
                }
            }
        }

        Command::Verify { email, code } => {
            let session = app.session.verify_sign_up(&email, &code).await?;
            welcome(app, &session.user_id).await?;
        }

        Command::SignIn { email, password } => {
            let password = password_or_prompt(password, false)?;
            let session = app.session.sign_in_with_password(&email, &password).await?;
            tracing::info!("✅ Signed in as {}", session.user_id);
        }

        Command::SignInGoogle { id_token, nonce } => {
            let session = app
                .session
                .sign_in_with_google(&id_token, nonce.as_deref())
                .await?;
            welcome(app, &session.user_id).await?;
        }

        Command::SignOut => {
            app.session.sign_out().await?;
            println!("Signed out");
        }

        Command::Whoami => match app.profiles.current().await {
            Ok(Some(profile)) => print_json(&profile)?,
            Ok(None) => println!("Signed in, but no profile exists yet"),
            Err(e) if e.is_auth_failure() => println!("Not signed in"),
            Err(e) => return Err(e.into()),
        },

        Command::Feed {
            kind,
            limit,
            offset,
        } => {
            let recipes = app
                .recipes
                .feed(feed_kind(kind), Page::new(limit, offset))
                .await?;
            print_json(&recipes)?;
        }

        Command::Recipe { id } => match app.recipes.get(parse_id(&id)?).await? {
            Some(recipe) => print_json(&recipe)?,
            None => anyhow::bail!("Recipe {} not found", id),
        },

        Command::Comments { recipe_id } => {
            let thread = app.comments.thread(parse_id(&recipe_id)?).await?;
            print_json(&flatten_thread(&thread))?;
        }

        Command::Comment {
            recipe_id,
            content,
            reply_to,
        } => {
            let parent = reply_to.as_deref().map(parse_id).transpose()?;
            let comment = app
                .comments
                .add(parse_id(&recipe_id)?, &content, parent)
                .await?;
            print_json(&comment)?;
        }

        Command::Like { recipe_id } => app.likes.mark(parse_id(&recipe_id)?).await?,
        Command::Unlike { recipe_id } => app.likes.unmark(parse_id(&recipe_id)?).await?,
        Command::Save { recipe_id } => app.saves.mark(parse_id(&recipe_id)?).await?,
        Command::Unsave { recipe_id } => app.saves.unmark(parse_id(&recipe_id)?).await?,

        Command::Saved => {
            let recipes = app.saves.marked_recipes(Page::default()).await?;
            print_json(&recipes)?;
        }

        Command::Follow { user_id } => app.follows.follow(parse_id(&user_id)?).await?,
        Command::Unfollow { user_id } => app.follows.unfollow(parse_id(&user_id)?).await?,

        Command::Notifications { limit, mark_read } => {
            let notifications = app.notifications.list(limit).await?;
            print_json(&notifications)?;
            if mark_read {
                let updated = app.notifications.mark_all_read().await?;
                tracing::info!("Marked {} notifications as read", updated.len());
            }
        }

        Command::RegisterPush { token, platform } => {
            let sent = app
                .notifications
                .register_push_token(&token, &platform)
                .await?;
            if sent {
                println!("Push token registered");
            } else {
                println!("Push token already registered");
            }
        }
    }

    Ok(())
}

/// Greet a freshly signed-in user once their profile row is visible
async fn welcome(app: &Culinair, user_id: &str) -> Result<()> {
    let id = parse_id(user_id)?;
    if app.profiles.wait_until_exists(id).await? {
        if let Some(profile) = app.profiles.get(id).await? {
            tracing::info!("✅ Welcome, {}", profile.username);
            return Ok(());
        }
    }
    tracing::warn!("Signed in, but the profile is not ready yet");
    Ok(())
}

fn password_or_prompt(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let prompt = Password::new().with_prompt("Password");
    let prompt = if confirm {
        prompt.with_confirmation("Repeat password", "Passwords don't match")
    } else {
        prompt
    };
    prompt.interact().context("Failed to read password")
}

fn feed_kind(arg: FeedArg) -> FeedKind {
    match arg {
        FeedArg::Public => FeedKind::Public,
        FeedArg::Following => FeedKind::Following,
        FeedArg::Trending => FeedKind::Trending,
        FeedArg::Recommended => FeedKind::Recommended,
    }
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim()).with_context(|| format!("'{}' is not a valid id", s))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
