use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::ProfileSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    #[serde(other)]
    Other,
}

/// Row of the `notifications` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    #[serde(default)]
    pub recipe_id: Option<Uuid>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ProfileSummary>,
}

/// Row of the `push_tokens` table
#[derive(Debug, Clone, Serialize)]
pub struct PushRegistration<'a> {
    pub user_id: Uuid,
    pub token: &'a str,
    pub platform: &'a str,
}
