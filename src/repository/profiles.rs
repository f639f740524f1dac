use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{logged, IdRow};
use crate::auth::SessionManager;
use crate::error::{ClientError, Result};
use crate::models::{Profile, ProfileUpdate};
use crate::rest::{Order, Query, Rest};

const PROFILES: &str = "profiles";

/// Interval between existence checks while waiting for a new profile row
const PROFILE_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct ProfileRepository {
    rest: Rest,
    session: Arc<SessionManager>,
    wait_timeout: Duration,
}

impl ProfileRepository {
    pub fn new(rest: Rest, session: Arc<SessionManager>, wait_timeout: Duration) -> Self {
        Self {
            rest,
            session,
            wait_timeout,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Profile>> {
        let result = self
            .rest
            .select_one(PROFILES, Query::new().select("*").eq("id", id))
            .await;
        logged("profiles.get", result)
    }

    /// Profile of the signed-in user
    pub async fn current(&self) -> Result<Option<Profile>> {
        let id = logged("profiles.current", self.session.current_user_id().await)?;
        self.get(id).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let result = self
            .rest
            .select_one(PROFILES, Query::new().select("*").eq("username", username))
            .await;
        logged("profiles.get_by_username", result)
    }

    /// Username search, alphabetical
    pub async fn search(&self, needle: &str, limit: u32) -> Result<Vec<Profile>> {
        if needle.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new()
            .select("*")
            .ilike("username", needle.trim())
            .order("username", Order::Asc)
            .limit(limit);
        logged("profiles.search", self.rest.select(PROFILES, &query).await)
    }

    /// Update the signed-in user's profile
    pub async fn update(&self, update: &ProfileUpdate) -> Result<Profile> {
        let result: Result<Profile> = async {
            if update.is_empty() {
                return Err(ClientError::ValidationError(
                    "Nothing to update".to_string(),
                ));
            }
            if let Some(username) = &update.username {
                validate_username(username)?;
            }

            let id = self.session.current_user_id().await?;
            let rows: Vec<Profile> = self
                .rest
                .update(PROFILES, &Query::new().eq("id", id), update)
                .await?;
            rows.into_iter().next().ok_or_else(|| ClientError::BackendError {
                status: 404,
                message: format!("Profile {} not found", id),
            })
        }
        .await;
        logged("profiles.update", result)
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let result = self
            .rest
            .select_one::<IdRow>(PROFILES, Query::new().select("id").eq("id", id))
            .await
            .map(|row| row.is_some_and(|row| row.id == id));
        logged("profiles.exists", result)
    }

    /// Poll until the profile row exists or the wait timeout runs out.
    ///
    /// The row is created by a backend trigger after sign-up, so it can lag the
    /// auth response. Transient errors are retried until the deadline; auth
    /// failures end the wait immediately.
    pub async fn wait_until_exists(&self, id: Uuid) -> Result<bool> {
        let deadline = Instant::now() + self.wait_timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.exists(id).await {
                Ok(true) => {
                    tracing::debug!(user_id = %id, attempt, "Profile is available");
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => {
                    tracing::warn!(user_id = %id, attempt, "Profile check failed, retrying: {}", e);
                }
            }

            if Instant::now() + PROFILE_POLL_INTERVAL > deadline {
                tracing::warn!(
                    user_id = %id,
                    attempts = attempt,
                    "Gave up waiting for profile after {:?}",
                    self.wait_timeout
                );
                return Ok(false);
            }
            tokio::time::sleep(PROFILE_POLL_INTERVAL).await;
        }
    }
}

fn validate_username(username: &str) -> Result<()> {
    let valid_len = (3..=30).contains(&username.chars().count());
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(ClientError::ValidationError(format!(
            "Username must be 3-30 letters, digits, '_' or '.': {}",
            username
        )))
    }
}
