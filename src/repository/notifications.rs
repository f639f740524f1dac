use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{logged, IdRow};
use crate::auth::SessionManager;
use crate::error::{ClientError, Result};
use crate::models::{Notification, PushRegistration};
use crate::push::PushTokenStore;
use crate::rest::{Order, Query, Rest};

const NOTIFICATIONS: &str = "notifications";
const PUSH_TOKENS: &str = "push_tokens";
const ACTOR_EMBED: &str = "actor:profiles!actor_id(id,username,avatar_url)";

#[derive(Serialize)]
struct ReadFlag {
    read: bool,
}

#[derive(Clone)]
pub struct NotificationRepository {
    rest: Rest,
    session: Arc<SessionManager>,
    push_tokens: PushTokenStore,
}

impl NotificationRepository {
    pub fn new(rest: Rest, session: Arc<SessionManager>, push_tokens: PushTokenStore) -> Self {
        Self {
            rest,
            session,
            push_tokens,
        }
    }

    /// The signed-in user's notifications, newest first
    pub async fn list(&self, limit: u32) -> Result<Vec<Notification>> {
        let result: Result<Vec<Notification>> = async {
            let me = self.session.current_user_id().await?;
            let query = Query::new()
                .select(&format!("*,{}", ACTOR_EMBED))
                .eq("recipient_id", me)
                .order("created_at", Order::Desc)
                .limit(limit);
            self.rest.select(NOTIFICATIONS, &query).await
        }
        .await;
        logged("notifications.list", result)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let me = self.session.current_user_id().await?;
            let query = Query::new()
                .select("id")
                .eq("id", id)
                .eq("recipient_id", me);
            let _: Vec<IdRow> = self
                .rest
                .update(NOTIFICATIONS, &query, &ReadFlag { read: true })
                .await?;
            Ok(())
        }
        .await;
        logged("notifications.mark_read", result)
    }

    /// Mark every unread notification as read; returns the ids that changed
    pub async fn mark_all_read(&self) -> Result<Vec<Uuid>> {
        let result: Result<Vec<Uuid>> = async {
            let me = self.session.current_user_id().await?;
            let query = Query::new()
                .select("id")
                .eq("recipient_id", me)
                .eq("read", false);
            let rows: Vec<IdRow> = self
                .rest
                .update(NOTIFICATIONS, &query, &ReadFlag { read: true })
                .await?;
            Ok(rows.into_iter().map(|row| row.id).collect())
        }
        .await;
        logged("notifications.mark_all_read", result)
    }

    /// Register this device's push token for the signed-in user.
    ///
    /// Skipped when this device already registered the same token for the
    /// same user. Returns whether a registration was sent.
    pub async fn register_push_token(&self, token: &str, platform: &str) -> Result<bool> {
        let result: Result<bool> = async {
            if token.trim().is_empty() {
                return Err(ClientError::ValidationError(
                    "Push token cannot be empty".to_string(),
                ));
            }
            let user_id = self.session.current_user_id().await?;
            if self.push_tokens.is_registered(user_id, token) {
                tracing::debug!("Push token already registered for this user, skipping");
                return Ok(false);
            }

            self.rest
                .upsert(
                    PUSH_TOKENS,
                    "token",
                    &PushRegistration {
                        user_id,
                        token,
                        platform,
                    },
                )
                .await?;
            self.push_tokens.record(user_id, token)?;
            tracing::info!(platform, "Push token registered");
            Ok(true)
        }
        .await;
        logged("notifications.register_push_token", result)
    }
}
