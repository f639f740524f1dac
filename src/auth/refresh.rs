// Token refresh over a bare side-channel client

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::types::{token_preview, RefreshRequest, TokenGrant, TokenResponse};
use crate::config::Config;
use crate::error::extract_error_message;

/// Get the refresh endpoint for a backend origin
fn get_refresh_url(backend_url: &str) -> String {
    format!(
        "{}/auth/v1/token?grant_type=refresh_token",
        backend_url.trim_end_matches('/')
    )
}

/// Exchanges a refresh token for a new token pair.
///
/// Owns its own `reqwest::Client` that never goes through the bearer/refresh
/// pipeline, so a failing refresh cannot recurse into another refresh.
#[derive(Clone)]
pub struct TokenRefresher {
    client: Client,
    refresh_url: String,
    api_key: String,
}

impl TokenRefresher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()
            .context("Failed to create refresh HTTP client")?;

        Ok(Self {
            client,
            refresh_url: get_refresh_url(&config.backend_url),
            api_key: config.api_key.clone(),
        })
    }

    /// Single refresh attempt. No retries: a rejected refresh token is terminal.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        tracing::info!(
            refresh_token = %token_preview(refresh_token),
            "Refreshing access token..."
        );

        let response = self
            .client
            .post(&self.refresh_url)
            .header("apikey", &self.api_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .context("Failed to send refresh request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %error_text,
                "Token refresh rejected"
            );
            anyhow::bail!(
                "Token refresh failed: {} - {}",
                status,
                extract_error_message(&error_text)
            );
        }

        let data: TokenResponse = response
            .json()
            .await
            .context("Failed to parse refresh response")?;

        let grant = data
            .into_grant()
            .context("Refresh response does not contain both access_token and refresh_token")?;

        tracing::info!(
            access_token = %token_preview(&grant.access_token),
            "Access token refreshed"
        );

        Ok(grant)
    }
}
