// Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use culinair_client::auth::{AuthMethod, IdentityProvider, Session};
use culinair_client::config::Config;
use culinair_client::storage::KvStore;
use culinair_client::Culinair;

pub const USER_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const OTHER_ID: &str = "00000000-0000-0000-0000-000000000002";
pub const RECIPE_ID: &str = "00000000-0000-0000-0000-0000000000aa";

pub fn test_config(backend_url: &str) -> Config {
    Config {
        backend_url: backend_url.to_string(),
        api_key: "anon-key".to_string(),
        store_file: PathBuf::from("unused.sqlite3"),
        store_key: None,
        http_connect_timeout: 5,
        http_request_timeout: 5,
        profile_wait_timeout: 1,
        log_level: "debug".to_string(),
    }
}

/// App over in-memory stores pointed at a mock backend
pub fn test_app(backend_url: &str) -> Culinair {
    test_app_with_provider(backend_url, None)
}

pub fn test_app_with_provider(
    backend_url: &str,
    provider: Option<Arc<dyn IdentityProvider>>,
) -> Culinair {
    let session_kv = KvStore::in_memory("session", None).unwrap();
    let push_kv = session_kv.namespace("push");
    Culinair::with_stores(test_config(backend_url), session_kv, push_kv, provider).unwrap()
}

pub fn session(access: &str, refresh: &str, method: AuthMethod) -> Session {
    Session {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        user_id: USER_ID.to_string(),
        auth_method: method,
    }
}

pub async fn sign_in_locally(app: &Culinair, access: &str, refresh: &str, method: AuthMethod) {
    app.http
        .credentials()
        .save(&session(access, refresh, method))
        .await
        .unwrap();
}

/// Store a session for a specific user, as after that user signs in
pub async fn sign_in_locally_as(app: &Culinair, user_id: &str, access: &str) {
    let session = Session {
        user_id: user_id.to_string(),
        ..session(access, "R-any", AuthMethod::EmailPassword)
    };
    app.http.credentials().save(&session).await.unwrap();
}

/// Token endpoint body for a fresh pair
pub fn token_body(access: &str, refresh: &str) -> String {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": { "id": USER_ID, "email": "cook@example.com" }
    })
    .to_string()
}

pub fn recipe_json(id: &str, user_id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": user_id,
        "title": title,
        "ingredients": ["flour"],
        "steps": ["mix"],
        "like_count": 0,
        "comment_count": 0,
        "created_at": "2025-01-12T10:00:00Z"
    })
}
