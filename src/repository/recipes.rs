use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::{logged, AUTHOR_EMBED};
use crate::auth::SessionManager;
use crate::error::{ClientError, Result};
use crate::models::{FeedKind, NewRecipe, Page, Recipe};
use crate::rest::{Order, Query, Rest};

const RECIPES: &str = "recipes";
const FOLLOWS: &str = "follows";
const TRENDING_RPC: &str = "trending_recipes";
const RECOMMENDED_RPC: &str = "recommended_recipes";

pub(crate) fn recipe_select() -> String {
    format!("*,{}", AUTHOR_EMBED)
}

#[derive(Serialize)]
struct RecipeRow<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    recipe: &'a NewRecipe,
}

#[derive(Deserialize)]
struct FollowingRow {
    following_id: Uuid,
}

#[derive(Clone)]
pub struct RecipeRepository {
    rest: Rest,
    session: Arc<SessionManager>,
}

impl RecipeRepository {
    pub fn new(rest: Rest, session: Arc<SessionManager>) -> Self {
        Self { rest, session }
    }

    /// Publish a recipe as the signed-in user
    pub async fn create(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let result: Result<Recipe> = async {
            if recipe.title.trim().is_empty() {
                return Err(ClientError::ValidationError(
                    "Recipe title cannot be empty".to_string(),
                ));
            }
            if recipe.ingredients.is_empty() || recipe.steps.is_empty() {
                return Err(ClientError::ValidationError(
                    "A recipe needs at least one ingredient and one step".to_string(),
                ));
            }

            let user_id = self.session.current_user_id().await?;
            let rows: Vec<Recipe> = self
                .rest
                .insert(RECIPES, &RecipeRow { user_id, recipe })
                .await?;
            rows.into_iter().next().ok_or_else(|| {
                ClientError::Internal(anyhow::anyhow!("Insert returned no recipe row"))
            })
        }
        .await;
        logged("recipes.create", result)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Recipe>> {
        let query = Query::new().select(&recipe_select()).eq("id", id);
        logged("recipes.get", self.rest.select_one(RECIPES, query).await)
    }

    pub async fn by_user(&self, user_id: Uuid, page: Page) -> Result<Vec<Recipe>> {
        let query = Query::new()
            .select(&recipe_select())
            .eq("user_id", user_id)
            .order("created_at", Order::Desc)
            .limit(page.limit)
            .offset(page.offset);
        logged("recipes.by_user", self.rest.select(RECIPES, &query).await)
    }

    /// Delete one of the signed-in user's recipes
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let user_id = self.session.current_user_id().await?;
            let query = Query::new().eq("id", id).eq("user_id", user_id);
            self.rest.delete(RECIPES, &query).await
        }
        .await;
        logged("recipes.delete", result)
    }

    pub async fn feed(&self, kind: FeedKind, page: Page) -> Result<Vec<Recipe>> {
        let result = match kind {
            FeedKind::Public => self.public_feed(page).await,
            FeedKind::Following => self.following_feed(page).await,
            FeedKind::Trending => {
                self.rest
                    .rpc(
                        TRENDING_RPC,
                        &json!({ "p_limit": page.limit, "p_offset": page.offset }),
                    )
                    .await
            }
            FeedKind::Recommended => self.recommended_feed(page).await,
        };
        logged("recipes.feed", result)
    }

    /// Recipes with the given ids, newest first
    pub(crate) async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Recipe>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new()
            .select(&recipe_select())
            .in_list("id", ids)
            .order("created_at", Order::Desc);
        self.rest.select(RECIPES, &query).await
    }

    async fn public_feed(&self, page: Page) -> Result<Vec<Recipe>> {
        let query = Query::new()
            .select(&recipe_select())
            .order("created_at", Order::Desc)
            .limit(page.limit)
            .offset(page.offset);
        self.rest.select(RECIPES, &query).await
    }

    async fn following_feed(&self, page: Page) -> Result<Vec<Recipe>> {
        let me = self.session.current_user_id().await?;
        let follows: Vec<FollowingRow> = self
            .rest
            .select(
                FOLLOWS,
                &Query::new().select("following_id").eq("follower_id", me),
            )
            .await?;

        if follows.is_empty() {
            tracing::debug!("Following feed is empty: user follows nobody");
            return Ok(Vec::new());
        }

        let authors: Vec<Uuid> = follows.into_iter().map(|f| f.following_id).collect();
        let query = Query::new()
            .select(&recipe_select())
            .in_list("user_id", &authors)
            .order("created_at", Order::Desc)
            .limit(page.limit)
            .offset(page.offset);
        self.rest.select(RECIPES, &query).await
    }

    async fn recommended_feed(&self, page: Page) -> Result<Vec<Recipe>> {
        let me = self.session.current_user_id().await?;
        self.rest
            .rpc(
                RECOMMENDED_RPC,
                &json!({ "p_user_id": me, "p_limit": page.limit, "p_offset": page.offset }),
            )
            .await
    }
}
