use std::sync::Arc;
use uuid::Uuid;

use super::{logged, AUTHOR_EMBED};
use crate::auth::SessionManager;
use crate::comment_tree::{build_comment_tree, CommentNode};
use crate::error::{ClientError, Result};
use crate::models::{Comment, NewComment};
use crate::rest::{Order, Query, Rest};

const COMMENTS: &str = "comments";
const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Clone)]
pub struct CommentRepository {
    rest: Rest,
    session: Arc<SessionManager>,
}

impl CommentRepository {
    pub fn new(rest: Rest, session: Arc<SessionManager>) -> Self {
        Self { rest, session }
    }

    /// All comments on a recipe, flat, oldest first
    pub async fn list(&self, recipe_id: Uuid) -> Result<Vec<Comment>> {
        let query = Query::new()
            .select(&format!("*,{}", AUTHOR_EMBED))
            .eq("recipe_id", recipe_id)
            .order("created_at", Order::Asc);
        logged("comments.list", self.rest.select(COMMENTS, &query).await)
    }

    /// Comments on a recipe as a reply tree
    pub async fn thread(&self, recipe_id: Uuid) -> Result<Vec<CommentNode>> {
        let comments = self.list(recipe_id).await?;
        Ok(build_comment_tree(comments))
    }

    /// Post a comment, or a reply when `parent_id` is set
    pub async fn add(
        &self,
        recipe_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        let result: Result<Comment> = async {
            let content = validate_content(content)?;
            let user_id = self.session.current_user_id().await?;

            let rows: Vec<Comment> = self
                .rest
                .insert(
                    COMMENTS,
                    &NewComment {
                        recipe_id,
                        user_id,
                        parent_id,
                        content,
                    },
                )
                .await?;
            rows.into_iter().next().ok_or_else(|| {
                ClientError::Internal(anyhow::anyhow!("Insert returned no comment row"))
            })
        }
        .await;
        logged("comments.add", result)
    }

    /// Delete one of the signed-in user's comments
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let user_id = self.session.current_user_id().await?;
            let query = Query::new().eq("id", id).eq("user_id", user_id);
            self.rest.delete(COMMENTS, &query).await
        }
        .await;
        logged("comments.delete", result)
    }
}

fn validate_content(content: &str) -> Result<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ClientError::ValidationError(
            "Comment cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ClientError::ValidationError(format!(
            "Comment is longer than {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(content)
}
