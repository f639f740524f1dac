use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::logged;
use crate::auth::SessionManager;
use crate::error::{ClientError, Result};
use crate::models::Profile;
use crate::rest::{Order, Query, Rest};

const FOLLOWS: &str = "follows";
const PROFILES: &str = "profiles";

#[derive(Serialize)]
struct FollowRow {
    follower_id: Uuid,
    following_id: Uuid,
}

#[derive(Deserialize)]
struct FollowerRow {
    follower_id: Uuid,
}

#[derive(Deserialize)]
struct FollowingRow {
    following_id: Uuid,
}

#[derive(Clone)]
pub struct FollowRepository {
    rest: Rest,
    session: Arc<SessionManager>,
}

impl FollowRepository {
    pub fn new(rest: Rest, session: Arc<SessionManager>) -> Self {
        Self { rest, session }
    }

    pub async fn follow(&self, target: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let me = self.session.current_user_id().await?;
            if me == target {
                return Err(ClientError::ValidationError(
                    "You cannot follow yourself".to_string(),
                ));
            }
            self.rest
                .upsert(
                    FOLLOWS,
                    "follower_id,following_id",
                    &FollowRow {
                        follower_id: me,
                        following_id: target,
                    },
                )
                .await
        }
        .await;
        logged("follows.follow", result)
    }

    pub async fn unfollow(&self, target: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let me = self.session.current_user_id().await?;
            let query = Query::new()
                .eq("follower_id", me)
                .eq("following_id", target);
            self.rest.delete(FOLLOWS, &query).await
        }
        .await;
        logged("follows.unfollow", result)
    }

    pub async fn is_following(&self, target: Uuid) -> Result<bool> {
        let result: Result<bool> = async {
            let me = self.session.current_user_id().await?;
            let query = Query::new()
                .select("following_id")
                .eq("follower_id", me)
                .eq("following_id", target);
            let row: Option<FollowingRow> = self.rest.select_one(FOLLOWS, query).await?;
            Ok(row.is_some())
        }
        .await;
        logged("follows.is_following", result)
    }

    /// Profiles following `user_id`
    pub async fn followers(&self, user_id: Uuid) -> Result<Vec<Profile>> {
        let result: Result<Vec<Profile>> = async {
            let query = Query::new()
                .select("follower_id")
                .eq("following_id", user_id);
            let rows: Vec<FollowerRow> = self.rest.select(FOLLOWS, &query).await?;
            let ids: Vec<Uuid> = rows.into_iter().map(|r| r.follower_id).collect();
            self.profiles(&ids).await
        }
        .await;
        logged("follows.followers", result)
    }

    /// Profiles `user_id` follows
    pub async fn following(&self, user_id: Uuid) -> Result<Vec<Profile>> {
        let result: Result<Vec<Profile>> = async {
            let query = Query::new()
                .select("following_id")
                .eq("follower_id", user_id);
            let rows: Vec<FollowingRow> = self.rest.select(FOLLOWS, &query).await?;
            let ids: Vec<Uuid> = rows.into_iter().map(|r| r.following_id).collect();
            self.profiles(&ids).await
        }
        .await;
        logged("follows.following", result)
    }

    async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new()
            .select("*")
            .in_list("id", ids)
            .order("username", Order::Asc);
        self.rest.select(PROFILES, &query).await
    }
}
