// Last push-notification registration made from this device

use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::storage::KvStore;

const KEY_PUSH_TOKEN: &str = "push_token";
const KEY_PUSH_USER_ID: &str = "push_user_id";

/// Which user a device token was last registered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRegistrationRecord {
    pub user_id: Uuid,
    pub token: String,
}

/// Small store beside the session store, so sign-out leaves it intact
#[derive(Clone)]
pub struct PushTokenStore {
    kv: KvStore,
}

impl PushTokenStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Last registration, if both halves are stored and readable
    pub fn last_registration(&self) -> Option<PushRegistrationRecord> {
        let mut values = match self.kv.get_many(&[KEY_PUSH_TOKEN, KEY_PUSH_USER_ID]) {
            Ok(values) => values,
            Err(e) => {
                tracing::error!("Failed to read push registration: {:#}", e);
                return None;
            }
        };

        let token = values.remove(KEY_PUSH_TOKEN)?;
        let user_id = values.remove(KEY_PUSH_USER_ID)?;
        match Uuid::parse_str(&user_id) {
            Ok(user_id) => Some(PushRegistrationRecord { user_id, token }),
            Err(_) => {
                tracing::warn!("Stored push registration has a malformed user id, ignoring it");
                None
            }
        }
    }

    /// True when `token` was already registered for `user_id` from this device
    pub fn is_registered(&self, user_id: Uuid, token: &str) -> bool {
        self.last_registration()
            .is_some_and(|last| last.user_id == user_id && last.token == token)
    }

    pub fn record(&self, user_id: Uuid, token: &str) -> Result<()> {
        let user_id = user_id.to_string();
        self.kv
            .put_all(&[(KEY_PUSH_TOKEN, token), (KEY_PUSH_USER_ID, user_id.as_str())])
            .map_err(|e| ClientError::StorageError(format!("{:#}", e)))
    }

    pub fn clear(&self) -> Result<()> {
        self.kv
            .remove_all()
            .map_err(|e| ClientError::StorageError(format!("{:#}", e)))
    }
}
