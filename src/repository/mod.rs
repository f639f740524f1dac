// Repositories over the backend's REST tables
// Every public operation logs its failure before returning it

mod comments;
mod follows;
mod marks;
mod notifications;
mod profiles;
mod recipes;

pub use comments::CommentRepository;
pub use follows::FollowRepository;
pub use marks::{MarkKind, MarkRepository};
pub use notifications::NotificationRepository;
pub use profiles::ProfileRepository;
pub use recipes::RecipeRepository;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;

/// Columns used when a profile is embedded in another row
pub(crate) const AUTHOR_EMBED: &str = "author:profiles(id,username,avatar_url)";

/// Log a failed repository call and hand the result back unchanged
pub(crate) fn logged<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        if e.is_auth_failure() {
            tracing::warn!(operation, "Repository call needs a session: {}", e);
        } else {
            tracing::error!(operation, error = %e, "Repository call failed");
        }
    }
    result
}

/// Row projection holding a single id column
#[derive(Debug, Deserialize)]
pub(crate) struct IdRow {
    pub id: Uuid,
}
