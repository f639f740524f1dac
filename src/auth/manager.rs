use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::credentials::CredentialStore;
use super::types::{
    AuthMethod, IdTokenRequest, PasswordCredentials, Session, SignUpMetadata, SignUpOutcome,
    SignUpRequest, SignUpResponse, TokenResponse, VerifyRequest,
};
use crate::error::{ClientError, Result};
use crate::http_client::BackendClient;

/// Federated identity provider whose own session must end on sign-out
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_out(&self) -> anyhow::Result<()>;
}

/// Session manager
/// Signs users in and out and keeps the credential store in step
pub struct SessionManager {
    http: Arc<BackendClient>,

    credentials: Arc<CredentialStore>,

    /// Google sign-out hook, only consulted for Google sessions
    identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl SessionManager {
    pub fn new(http: Arc<BackendClient>) -> Self {
        let credentials = Arc::clone(http.credentials());
        Self {
            http,
            credentials,
            identity_provider: None,
        }
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Register a new account
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome> {
        let email = validate_email(email)?;
        if password.len() < 6 {
            return Err(ClientError::ValidationError(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if username.trim().is_empty() {
            return Err(ClientError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }

        let body = SignUpRequest {
            email,
            password,
            data: SignUpMetadata {
                username: username.trim(),
            },
        };
        let response = self.post_auth("/auth/v1/signup", &body).await?;
        let response: SignUpResponse = response.json().await?;

        match response {
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "Sign-up pending email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired { user_id: user.id })
            }
            SignUpResponse::Session(tokens) => {
                let session = self.store_tokens(tokens, AuthMethod::EmailPassword).await?;
                Ok(SignUpOutcome::SignedIn(session))
            }
        }
    }

    /// Confirm a pending sign-up with the emailed one-time code
    pub async fn verify_sign_up(&self, email: &str, code: &str) -> Result<Session> {
        let email = validate_email(email)?;
        let body = VerifyRequest {
            kind: "signup",
            email,
            token: code.trim(),
        };
        let response = self.post_auth("/auth/v1/verify", &body).await?;
        let tokens: TokenResponse = response.json().await?;
        self.store_tokens(tokens, AuthMethod::EmailPassword).await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let email = validate_email(email)?;

        let body = PasswordCredentials { email, password };
        let response = self
            .post_auth("/auth/v1/token?grant_type=password", &body)
            .await?;
        let tokens: TokenResponse = response.json().await?;
        self.store_tokens(tokens, AuthMethod::EmailPassword).await
    }

    /// Exchange a Google ID token for a backend session
    pub async fn sign_in_with_google(&self, id_token: &str, nonce: Option<&str>) -> Result<Session> {
        if id_token.is_empty() {
            return Err(ClientError::ValidationError(
                "Google ID token is empty".to_string(),
            ));
        }

        let body = IdTokenRequest {
            provider: "google",
            id_token,
            nonce,
        };
        let response = self
            .post_auth("/auth/v1/token?grant_type=id_token", &body)
            .await?;
        let tokens: TokenResponse = response.json().await?;
        self.store_tokens(tokens, AuthMethod::Google).await
    }

    /// End the session locally, on the backend, and at the identity provider.
    ///
    /// Remote failures are logged; the local session is always cleared.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.credentials.session().await else {
            tracing::debug!("Sign-out requested with no stored session");
            return Ok(());
        };

        // Auth endpoints skip bearer attachment, so the token goes on explicitly
        let request = self
            .http
            .request(Method::POST, "/auth/v1/logout")
            .bearer_auth(&session.access_token)
            .build();
        match request {
            Ok(request) => match self.http.execute(request).await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Backend session revoked");
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "Backend logout was not accepted");
                }
                Err(e) => {
                    tracing::warn!("Backend logout failed: {}", e);
                }
            },
            Err(e) => tracing::warn!("Failed to build logout request: {}", e),
        }

        self.credentials.clear().await?;

        if session.auth_method == AuthMethod::Google {
            if let Some(provider) = &self.identity_provider {
                if let Err(e) = provider.sign_out().await {
                    tracing::warn!("Identity provider sign-out failed: {:#}", e);
                }
            }
        }

        tracing::info!(user_id = %session.user_id, "Signed out");
        Ok(())
    }

    pub async fn is_signed_in(&self) -> bool {
        self.credentials.session().await.is_some()
    }

    /// Signed-in user's id
    pub async fn current_user_id(&self) -> Result<Uuid> {
        let user_id = self
            .credentials
            .user_id()
            .await
            .ok_or(ClientError::NotAuthenticated)?;

        Uuid::parse_str(&user_id).map_err(|e| {
            ClientError::StorageError(format!("Stored user id '{}' is not a UUID: {}", user_id, e))
        })
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.credentials.session().await
    }

    async fn post_auth<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let request = self.http.request(Method::POST, path).json(body).build()?;
        let response = self.http.execute(request).await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = crate::error::extract_error_message(&text);
        tracing::warn!(status = status.as_u16(), path, "Auth request rejected: {}", message);

        if status.is_client_error() {
            Err(ClientError::AuthError(message))
        } else {
            Err(ClientError::BackendError {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn store_tokens(&self, tokens: TokenResponse, method: AuthMethod) -> Result<Session> {
        let grant = tokens.into_grant().ok_or_else(|| {
            ClientError::AuthError("Auth response did not include a session".to_string())
        })?;

        let session = grant.into_session(method);
        self.credentials.save(&session).await?;
        tracing::info!(
            user_id = %session.user_id,
            method = method.as_str(),
            "Signed in"
        );
        Ok(session)
    }
}

/// Check the address shape and return it without surrounding whitespace
fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ClientError::ValidationError(format!(
            "Invalid email address: {}",
            email
        )))
    }
}
