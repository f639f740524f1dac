// Backend row types

pub mod comment;
pub mod notification;
pub mod profile;
pub mod recipe;

pub use comment::{Comment, NewComment};
pub use notification::{Notification, NotificationKind, PushRegistration};
pub use profile::{Profile, ProfileSummary, ProfileUpdate};
pub use recipe::{FeedKind, NewRecipe, Page, Recipe};
