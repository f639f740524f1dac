// Application composition: one shared session pipeline behind every repository

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialStore, IdentityProvider, SessionEvents, SessionManager};
use crate::config::Config;
use crate::http_client::BackendClient;
use crate::push::PushTokenStore;
use crate::repository::{
    CommentRepository, FollowRepository, MarkKind, MarkRepository, NotificationRepository,
    ProfileRepository, RecipeRepository,
};
use crate::rest::Rest;
use crate::storage::{KvStore, StoreCipher};

const SESSION_NAMESPACE: &str = "session";
const PUSH_NAMESPACE: &str = "push";

/// Everything a front end needs, wired to a single credential store
pub struct Culinair {
    pub config: Arc<Config>,
    pub events: SessionEvents,
    pub http: Arc<BackendClient>,
    pub session: Arc<SessionManager>,
    pub profiles: ProfileRepository,
    pub recipes: RecipeRepository,
    pub likes: MarkRepository,
    pub saves: MarkRepository,
    pub comments: CommentRepository,
    pub follows: FollowRepository,
    pub notifications: NotificationRepository,
}

impl Culinair {
    /// Open the on-disk store named in the config and build the client
    pub fn new(config: Config) -> Result<Self> {
        let cipher = match config.store_key.as_deref() {
            Some(key) => Some(StoreCipher::from_passphrase(key)),
            None => {
                tracing::warn!(
                    "No CULINAIR_STORE_KEY set, session tokens will be stored unencrypted"
                );
                None
            }
        };

        let session_kv = KvStore::open(&config.store_file, SESSION_NAMESPACE, cipher)
            .with_context(|| {
                format!("Failed to open session store at {}", config.store_file.display())
            })?;
        let push_kv = session_kv.namespace(PUSH_NAMESPACE);

        tracing::debug!(path = %config.store_file.display(), "Session store opened");
        Self::with_stores(config, session_kv, push_kv, None)
    }

    /// Build against caller-supplied stores
    pub fn with_stores(
        config: Config,
        session_kv: KvStore,
        push_kv: KvStore,
        identity_provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Result<Self> {
        let events = SessionEvents::new();
        let credentials = Arc::new(CredentialStore::new(session_kv));
        let http = Arc::new(BackendClient::new(&config, credentials, events.clone())?);

        let mut manager = SessionManager::new(Arc::clone(&http));
        if let Some(provider) = identity_provider {
            manager = manager.with_identity_provider(provider);
        }
        let session = Arc::new(manager);

        let rest = Rest::new(Arc::clone(&http));
        let recipes = RecipeRepository::new(rest.clone(), Arc::clone(&session));

        Ok(Self {
            profiles: ProfileRepository::new(
                rest.clone(),
                Arc::clone(&session),
                Duration::from_secs(config.profile_wait_timeout),
            ),
            likes: MarkRepository::new(
                rest.clone(),
                Arc::clone(&session),
                recipes.clone(),
                MarkKind::Like,
            ),
            saves: MarkRepository::new(
                rest.clone(),
                Arc::clone(&session),
                recipes.clone(),
                MarkKind::Save,
            ),
            comments: CommentRepository::new(rest.clone(), Arc::clone(&session)),
            follows: FollowRepository::new(rest.clone(), Arc::clone(&session)),
            notifications: NotificationRepository::new(
                rest,
                Arc::clone(&session),
                PushTokenStore::new(push_kv),
            ),
            recipes,
            session,
            http,
            events,
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(store_file: std::path::PathBuf, store_key: Option<&str>) -> Config {
        Config {
            backend_url: "https://api.culinair.app".to_string(),
            api_key: "anon-key".to_string(),
            store_file,
            store_key: store_key.map(str::to_string),
            http_connect_timeout: 5,
            http_request_timeout: 5,
            profile_wait_timeout: 1,
            log_level: "info".to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_creates_store_and_starts_signed_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.sqlite3");

        let app = Culinair::new(config(path.clone(), Some("passphrase"))).unwrap();
        assert!(path.exists());
        assert!(!app.session.is_signed_in().await);
        assert_eq!(app.likes.kind(), MarkKind::Like);
        assert_eq!(app.saves.kind(), MarkKind::Save);
    }

    #[tokio::test]
    async fn test_repositories_share_one_credential_store() {
        let dir = TempDir::new().unwrap();
        let app = Culinair::new(config(dir.path().join("s.sqlite3"), None)).unwrap();

        let session = crate::auth::Session {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            user_id: "00000000-0000-0000-0000-000000000001".to_string(),
            auth_method: crate::auth::AuthMethod::EmailPassword,
        };
        app.http.credentials().save(&session).await.unwrap();

        assert!(app.session.is_signed_in().await);
        assert_eq!(
            app.session.current_user_id().await.unwrap(),
            uuid::Uuid::from_u128(1)
        );
    }
}
