use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{logged, RecipeRepository};
use crate::auth::SessionManager;
use crate::error::Result;
use crate::models::{Page, Recipe};
use crate::rest::{Order, Query, Rest};

/// Per-user recipe marks sharing the `(user_id, recipe_id)` shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Like,
    Save,
}

impl MarkKind {
    fn table(&self) -> &'static str {
        match self {
            MarkKind::Like => "likes",
            MarkKind::Save => "saves",
        }
    }

    fn operation(&self, op: &str) -> String {
        format!("{}.{}", self.table(), op)
    }
}

#[derive(Serialize)]
struct MarkRow {
    user_id: Uuid,
    recipe_id: Uuid,
}

#[derive(Deserialize)]
struct RecipeIdRow {
    recipe_id: Uuid,
}

/// Likes and saves
#[derive(Clone)]
pub struct MarkRepository {
    rest: Rest,
    session: Arc<SessionManager>,
    recipes: RecipeRepository,
    kind: MarkKind,
}

impl MarkRepository {
    pub fn new(
        rest: Rest,
        session: Arc<SessionManager>,
        recipes: RecipeRepository,
        kind: MarkKind,
    ) -> Self {
        Self {
            rest,
            session,
            recipes,
            kind,
        }
    }

    pub fn kind(&self) -> MarkKind {
        self.kind
    }

    /// Mark a recipe; marking twice is a no-op
    pub async fn mark(&self, recipe_id: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let user_id = self.session.current_user_id().await?;
            self.rest
                .upsert(
                    self.kind.table(),
                    "user_id,recipe_id",
                    &MarkRow { user_id, recipe_id },
                )
                .await
        }
        .await;
        logged(&self.kind.operation("mark"), result)
    }

    pub async fn unmark(&self, recipe_id: Uuid) -> Result<()> {
        let result: Result<()> = async {
            let user_id = self.session.current_user_id().await?;
            let query = Query::new()
                .eq("user_id", user_id)
                .eq("recipe_id", recipe_id);
            self.rest.delete(self.kind.table(), &query).await
        }
        .await;
        logged(&self.kind.operation("unmark"), result)
    }

    pub async fn is_marked(&self, recipe_id: Uuid) -> Result<bool> {
        let result: Result<bool> = async {
            let user_id = self.session.current_user_id().await?;
            let query = Query::new()
                .select("recipe_id")
                .eq("user_id", user_id)
                .eq("recipe_id", recipe_id);
            let row: Option<RecipeIdRow> = self.rest.select_one(self.kind.table(), query).await?;
            Ok(row.is_some())
        }
        .await;
        logged(&self.kind.operation("is_marked"), result)
    }

    /// Flip the mark and return the new state
    pub async fn toggle(&self, recipe_id: Uuid) -> Result<bool> {
        if self.is_marked(recipe_id).await? {
            self.unmark(recipe_id).await?;
            Ok(false)
        } else {
            self.mark(recipe_id).await?;
            Ok(true)
        }
    }

    /// Recipes the signed-in user marked, most recently marked first
    pub async fn marked_recipes(&self, page: Page) -> Result<Vec<Recipe>> {
        let result: Result<Vec<Recipe>> = async {
            let user_id = self.session.current_user_id().await?;
            let query = Query::new()
                .select("recipe_id")
                .eq("user_id", user_id)
                .order("created_at", Order::Desc)
                .limit(page.limit)
                .offset(page.offset);
            let rows: Vec<RecipeIdRow> = self.rest.select(self.kind.table(), &query).await?;
            let ids: Vec<Uuid> = rows.into_iter().map(|r| r.recipe_id).collect();

            let mut recipes = self.recipes.by_ids(&ids).await?;
            recipes.sort_by_key(|recipe| {
                ids.iter()
                    .position(|id| *id == recipe.id)
                    .unwrap_or(usize::MAX)
            });
            Ok(recipes)
        }
        .await;
        logged(&self.kind.operation("marked_recipes"), result)
    }
}
