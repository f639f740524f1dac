// Credential store: persisted session fields with a read-through memory cache

use anyhow::Context;
use tokio::sync::RwLock;

use super::types::{AuthMethod, Session};
use crate::error::{ClientError, Result};
use crate::storage::KvStore;

const KEY_ACCESS_TOKEN: &str = "access_token";
const KEY_REFRESH_TOKEN: &str = "refresh_token";
const KEY_USER_ID: &str = "user_id";
const KEY_AUTH_METHOD: &str = "auth_method";

const SESSION_KEYS: [&str; 4] = [
    KEY_ACCESS_TOKEN,
    KEY_REFRESH_TOKEN,
    KEY_USER_ID,
    KEY_AUTH_METHOD,
];

enum Cache {
    /// Persistent storage has not been read yet
    Unloaded,
    Loaded(Option<Session>),
}

/// Device-local session store.
///
/// Single writer: one session per device. Reads go to the in-memory cache and
/// fall back to a one-time load from the preference store.
pub struct CredentialStore {
    kv: KvStore,
    cache: RwLock<Cache>,
}

impl CredentialStore {
    pub fn new(kv: KvStore) -> Self {
        Self {
            kv,
            cache: RwLock::new(Cache::Unloaded),
        }
    }

    /// Persist all four fields in one transaction, then update the cache
    pub async fn save(&self, session: &Session) -> Result<()> {
        let mut cache = self.cache.write().await;

        let stored = session.clone();
        self.blocking(move |kv| {
            kv.put_all(&[
                (KEY_ACCESS_TOKEN, stored.access_token.as_str()),
                (KEY_REFRESH_TOKEN, stored.refresh_token.as_str()),
                (KEY_USER_ID, stored.user_id.as_str()),
                (KEY_AUTH_METHOD, stored.auth_method.as_str()),
            ])
        })
        .await
        .map_err(|e| ClientError::StorageError(format!("{:#}", e)))?;

        *cache = Cache::Loaded(Some(session.clone()));
        tracing::debug!(user_id = %session.user_id, "Session saved");
        Ok(())
    }

    /// Remove every session field and reset the cache
    pub async fn clear(&self) -> Result<()> {
        let mut cache = self.cache.write().await;

        self.blocking(|kv| kv.remove_all())
            .await
            .map_err(|e| ClientError::StorageError(format!("{:#}", e)))?;

        *cache = Cache::Loaded(None);
        tracing::debug!("Session cleared");
        Ok(())
    }

    /// Current session, loading it from storage on first access
    pub async fn session(&self) -> Option<Session> {
        {
            let cache = self.cache.read().await;
            if let Cache::Loaded(ref session) = *cache {
                return session.clone();
            }
        }

        let mut cache = self.cache.write().await;
        if let Cache::Loaded(ref session) = *cache {
            return session.clone();
        }

        match self.blocking(load).await {
            Ok(session) => {
                *cache = Cache::Loaded(session.clone());
                session
            }
            Err(e) => {
                // Left unloaded so the next read tries again
                tracing::error!("Failed to load stored session: {:#}", e);
                None
            }
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session().await.map(|s| s.access_token)
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.session().await.map(|s| s.refresh_token)
    }

    pub async fn user_id(&self) -> Option<String> {
        self.session().await.map(|s| s.user_id)
    }

    pub async fn auth_method(&self) -> Option<AuthMethod> {
        self.session().await.map(|s| s.auth_method)
    }

    /// Run store I/O on the blocking pool; SQLite calls are synchronous
    async fn blocking<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        F: FnOnce(&KvStore) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let kv = self.kv.clone();
        tokio::task::spawn_blocking(move || op(&kv))
            .await
            .context("Session store task failed")?
    }
}

fn load(kv: &KvStore) -> anyhow::Result<Option<Session>> {
    let mut values = kv.get_many(&SESSION_KEYS)?;

    let access_token = values.remove(KEY_ACCESS_TOKEN);
    let refresh_token = values.remove(KEY_REFRESH_TOKEN);
    let user_id = values.remove(KEY_USER_ID);
    let auth_method = values.remove(KEY_AUTH_METHOD);

    match (access_token, refresh_token, user_id, auth_method) {
        (None, None, None, None) => Ok(None),
        (Some(access_token), Some(refresh_token), Some(user_id), Some(method)) => {
            let Some(auth_method) = AuthMethod::parse(&method) else {
                tracing::warn!("Stored session has unknown auth method '{}', ignoring it", method);
                return Ok(None);
            };

            Ok(Some(Session {
                access_token,
                refresh_token,
                user_id,
                auth_method,
            }))
        }
        _ => {
            tracing::warn!("Stored session is incomplete, treating device as signed out");
            Ok(None)
        }
    }
}
