// Authentication types

use serde::{Deserialize, Serialize};

/// How the current session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Email + password (including sign-up confirmation)
    EmailPassword,

    /// Google ID token exchanged with the backend
    Google,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::EmailPassword => "email_password",
            AuthMethod::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email_password" => Some(AuthMethod::EmailPassword),
            "google" => Some(AuthMethod::Google),
            _ => None,
        }
    }
}

/// Complete session as persisted on the device.
///
/// Both tokens are always present together; a half-written session is never
/// constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub auth_method: AuthMethod,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &token_preview(&self.access_token))
            .field("refresh_token", &token_preview(&self.refresh_token))
            .field("user_id", &self.user_id)
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// First few characters of a token, for logs
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

/// Token pair issued by the auth service
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

impl TokenGrant {
    pub fn into_session(self, auth_method: AuthMethod) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user_id,
            auth_method,
        }
    }
}

/// User object embedded in auth responses
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token endpoint response (password, id_token, refresh_token grants and verify)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl TokenResponse {
    /// Validate that the response carries a usable token pair
    pub fn into_grant(self) -> Option<TokenGrant> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty())?;
        let user_id = self.user?.id;

        Some(TokenGrant {
            access_token,
            refresh_token,
            user_id,
        })
    }
}

/// Sign-up response: the bare user while confirmation is pending, a full
/// session when auto-confirm is on. Only the bare user has a top-level `id`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    User(AuthUser),
    Session(TokenResponse),
}

#[derive(Serialize)]
pub struct PasswordCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata<'a>,
}

#[derive(Serialize)]
pub struct SignUpMetadata<'a> {
    pub username: &'a str,
}

#[derive(Serialize)]
pub struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub email: &'a str,
    pub token: &'a str,
}

#[derive(Serialize)]
pub struct IdTokenRequest<'a> {
    pub provider: &'a str,
    pub id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<&'a str>,
}

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Outcome of a sign-up call
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The backend sent a confirmation code; call `verify_sign_up` next
    ConfirmationRequired { user_id: String },

    /// Auto-confirmed account, session already stored
    SignedIn(Session),
}

/// Events published to session observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Refresh failed and the stored session was cleared
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_round_trip_strings() {
        for method in [AuthMethod::EmailPassword, AuthMethod::Google] {
            assert_eq!(AuthMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(AuthMethod::parse("github"), None);
    }

    #[test]
    fn test_token_response_into_grant() {
        let json = r#"{
            "access_token": "A1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "R1",
            "user": {"id": "8d1f7c0e-2a59-4b1e-9d6a-3f0b1c2d4e5f", "email": "cook@example.com"}
        }"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let grant = response.into_grant().unwrap();
        assert_eq!(grant.access_token, "A1");
        assert_eq!(grant.refresh_token, "R1");
        assert_eq!(grant.user_id, "8d1f7c0e-2a59-4b1e-9d6a-3f0b1c2d4e5f");
    }

    #[test]
    fn test_token_response_missing_refresh_token() {
        let json = r#"{"access_token": "A1", "user": {"id": "u1"}}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_grant().is_none());
    }

    #[test]
    fn test_token_response_empty_access_token() {
        let json = r#"{"access_token": "", "refresh_token": "R1", "user": {"id": "u1"}}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_grant().is_none());
    }

    #[test]
    fn test_sign_up_response_variants() {
        let pending = r#"{"id": "u1", "email": "cook@example.com", "confirmation_sent_at": "2025-01-12T10:30:00Z"}"#;
        match serde_json::from_str::<SignUpResponse>(pending).unwrap() {
            SignUpResponse::User(user) => assert_eq!(user.id, "u1"),
            SignUpResponse::Session(_) => panic!("expected pending user"),
        }

        let confirmed = r#"{"access_token": "A1", "refresh_token": "R1", "user": {"id": "u1"}}"#;
        match serde_json::from_str::<SignUpResponse>(confirmed).unwrap() {
            SignUpResponse::Session(resp) => assert!(resp.into_grant().is_some()),
            SignUpResponse::User(_) => panic!("expected session"),
        }
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session {
            access_token: "eyJhbGciOiJIUzI1NiJ9.payload.signature".to_string(),
            refresh_token: "r".to_string(),
            user_id: "u1".to_string(),
            auth_method: AuthMethod::Google,
        };
        let debug = format!("{:?}", session);
        assert!(debug.contains("eyJhbGci..."));
        assert!(!debug.contains("signature"));
    }

    #[test]
    fn test_id_token_request_skips_missing_nonce() {
        let body = serde_json::to_value(IdTokenRequest {
            provider: "google",
            id_token: "gid",
            nonce: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"provider": "google", "id_token": "gid"}));
    }
}
