// Authentication module
// Session persistence, token refresh and sign-in flows

mod credentials;
mod events;
mod manager;
mod refresh;
mod types;

pub use credentials::CredentialStore;
pub use events::SessionEvents;
pub use manager::{IdentityProvider, SessionManager};
pub use refresh::TokenRefresher;
pub use types::{token_preview, AuthMethod, Session, SessionEvent, SignUpOutcome, TokenGrant};
