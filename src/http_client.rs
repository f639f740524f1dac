use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{token_preview, CredentialStore, SessionEvents, TokenRefresher};
use crate::config::Config;
use crate::error::ClientError;

/// Path prefix of the auth service; requests under it never carry the stored bearer
const AUTH_PATH_PREFIX: &str = "/auth/v1/";

/// HTTP client for the Culinair backend.
///
/// Every request goes through two stages:
/// - bearer attachment from the credential store (skipped for auth endpoints)
/// - on 401, one refresh on the side-channel client and one replay
pub struct BackendClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Side-channel refresh, outside this pipeline
    refresher: TokenRefresher,

    credentials: Arc<CredentialStore>,

    events: SessionEvents,

    base_url: String,

    api_key: String,
}

impl BackendClient {
    pub fn new(
        config: &Config,
        credentials: Arc<CredentialStore>,
        events: SessionEvents,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            refresher: TokenRefresher::new(config)?,
            credentials,
            events,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Start a request against a backend path, with the API key attached
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Execute a request through the bearer and refresh stages.
    ///
    /// Returns whatever response the pipeline settles on, including 401s:
    /// status handling is left to the caller. `Err` is reserved for transport
    /// failures.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        let method = request.method().clone();
        let url = request.url().clone();

        if is_auth_endpoint(&request) {
            tracing::debug!(method = %method, url = %url, "Sending auth request");
            return self.send(request).await;
        }

        // Copy kept for the replay; streaming bodies cannot be replayed
        let replay = request.try_clone();

        let request = self.authorize(request).await;
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");
        let response = self.send(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!(method = %method, url = %url, "Received 401, attempting token refresh");
        self.recover_from_unauthorized(response, replay).await
    }

    /// Attach the stored access token, if any
    async fn authorize(&self, mut request: Request) -> Request {
        match self.credentials.access_token().await {
            Some(token) => {
                set_bearer(&mut request, &token);
            }
            None => {
                tracing::debug!("No access token stored, sending request without credentials");
            }
        }
        request
    }

    /// Refresh once and replay once. A second 401 is handed back untouched.
    async fn recover_from_unauthorized(
        &self,
        unauthorized: Response,
        replay: Option<Request>,
    ) -> Result<Response, ClientError> {
        let Some(session) = self.credentials.session().await else {
            tracing::debug!("No refresh token stored, request stays unauthenticated");
            return Ok(unauthorized);
        };

        let grant = match self.refresher.refresh(&session.refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!("Token refresh failed, ending session: {:#}", e);
                return self.expire(unauthorized).await;
            }
        };

        // Rotation keeps the original sign-in method
        let rotated = grant.into_session(session.auth_method);
        if let Err(e) = self.credentials.save(&rotated).await {
            tracing::error!("Failed to persist refreshed tokens: {}", e);
        }

        let Some(mut retry) = replay else {
            tracing::warn!("Request body is not replayable, returning original 401");
            return Ok(unauthorized);
        };
        drop(unauthorized);

        set_bearer(&mut retry, &rotated.access_token);
        tracing::debug!(
            access_token = %token_preview(&rotated.access_token),
            url = %retry.url(),
            "Replaying request with refreshed token"
        );

        let response = self.send(retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Replayed request was rejected again, not retrying");
        }
        Ok(response)
    }

    /// Clear the session, notify observers, and answer with a local 401
    async fn expire(&self, unauthorized: Response) -> Result<Response, ClientError> {
        let url = unauthorized.url().clone();
        drop(unauthorized);

        if let Err(e) = self.credentials.clear().await {
            tracing::error!("Failed to clear expired session: {}", e);
        }
        self.events.session_expired();

        Ok(local_unauthorized(&url))
    }

    async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let url = request.url().clone();
        match self.client.execute(request).await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else if e.is_body() {
                    "body_error"
                } else if e.is_decode() {
                    "decode_error"
                } else {
                    "unknown"
                };

                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request error"
                );
                Err(ClientError::Network(e))
            }
        }
    }
}

fn is_auth_endpoint(request: &Request) -> bool {
    request.url().path().starts_with(AUTH_PATH_PREFIX)
}

fn set_bearer(request: &mut Request, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(value) => {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::error!("Stored access token is not a valid header value, sending without it");
            request.headers_mut().remove(AUTHORIZATION);
        }
    }
}

/// A 401 built on the client, used once the session is gone
fn local_unauthorized(url: &reqwest::Url) -> Response {
    let body = serde_json::json!({
        "message": "Session expired",
        "url": url.as_str(),
    })
    .to_string();

    let response = http::Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap_or_else(|_| {
            let mut fallback = http::Response::new(String::new());
            *fallback.status_mut() = StatusCode::UNAUTHORIZED;
            fallback
        });

    Response::from(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KvStore;

    fn test_config() -> Config {
        Config {
            backend_url: "https://api.culinair.app/".to_string(),
            api_key: "anon-key".to_string(),
            store_file: std::path::PathBuf::from("/tmp/unused.sqlite3"),
            store_key: None,
            http_connect_timeout: 5,
            http_request_timeout: 5,
            profile_wait_timeout: 1,
            log_level: "info".to_string(),
        }
    }

    fn test_client() -> BackendClient {
        let store = Arc::new(CredentialStore::new(
            KvStore::in_memory("session", None).unwrap(),
        ));
        BackendClient::new(&test_config(), store, SessionEvents::new()).unwrap()
    }

    #[test]
    fn test_request_joins_base_url_and_sets_api_key() {
        let client = test_client();
        let request = client
            .request(Method::GET, "/rest/v1/recipes")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.culinair.app/rest/v1/recipes"
        );
        assert_eq!(request.headers()["apikey"], "anon-key");
    }

    #[test]
    fn test_is_auth_endpoint() {
        let client = test_client();
        let auth = client
            .request(Method::POST, "/auth/v1/token?grant_type=password")
            .build()
            .unwrap();
        let rest = client
            .request(Method::GET, "/rest/v1/profiles")
            .build()
            .unwrap();
        assert!(is_auth_endpoint(&auth));
        assert!(!is_auth_endpoint(&rest));
    }

    #[test]
    fn test_set_bearer_replaces_existing_header() {
        let client = test_client();
        let mut request = client
            .request(Method::GET, "/rest/v1/recipes")
            .bearer_auth("old")
            .build()
            .unwrap();
        set_bearer(&mut request, "new");
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer new");
    }

    #[test]
    fn test_set_bearer_rejects_invalid_token() {
        let client = test_client();
        let mut request = client
            .request(Method::GET, "/rest/v1/recipes")
            .build()
            .unwrap();
        set_bearer(&mut request, "bad\ntoken");
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_local_unauthorized() {
        let url = reqwest::Url::parse("https://api.culinair.app/rest/v1/recipes").unwrap();
        let response = local_unauthorized(&url);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Session expired");
    }

    #[tokio::test]
    async fn test_authorize_without_session_sends_no_header() {
        let client = test_client();
        let request = client
            .request(Method::GET, "/rest/v1/recipes")
            .build()
            .unwrap();
        let request = client.authorize(request).await;
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
