//! Microsoft Entra ID Authentication
//!
//! Dataverse 用の OAuth2 client credentials トークン取得

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use tokio::sync::OnceCell;

#[cfg(test)]
use mockall::automock;

use crate::domain::errors::SyncError;

/// Bearer token source for the Dataverse Web API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return an access token, acquiring it on first use
    async fn token(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client credentials flow against the tenant's v2.0 token endpoint.
///
/// The token is cached for the lifetime of the process and never refreshed;
/// a run outliving it fails with an authentication error on the next batch.
pub struct ClientCredentialsTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: OnceCell<String>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(
        http: reqwest::Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: String,
        client_secret: String,
        resource_url: &str,
    ) -> Self {
        Self {
            http,
            token_url: token_url(authority_host, tenant_id),
            client_id,
            client_secret,
            scope: default_scope(resource_url),
            cached: OnceCell::new(),
        }
    }

    #[cfg_attr(coverage_nightly, coverage(off))]
    async fn acquire(&self) -> Result<String> {
        debug!("Requesting token from {}", self.token_url);

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("Token request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to read token response: {}", e)))?;

        let token = parse_token_response(status, &body)?;
        info!("Token acquired.");
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn token(&self) -> Result<String> {
        self.cached
            .get_or_try_init(|| self.acquire())
            .await
            .cloned()
    }
}

/// `{authority}/{tenant}/oauth2/v2.0/token`
pub fn token_url(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
    )
}

/// `{resource}/.default`, the application permissions of the Dataverse environment
pub fn default_scope(resource_url: &str) -> String {
    format!("{}/.default", resource_url.trim_end_matches('/'))
}

fn parse_token_response(status: u16, body: &str) -> Result<String> {
    if (200..300).contains(&status) {
        let parsed: TokenResponse = serde_json::from_str(body).map_err(|e| {
            SyncError::Auth(format!("Token endpoint returned an unreadable body: {}", e))
        })?;
        if parsed.access_token.is_empty() {
            return Err(SyncError::Auth("Token endpoint returned an empty access_token".into()).into());
        }
        if let Some(expires_in) = parsed.expires_in {
            debug!("Token expires in {}s", expires_in);
        }
        return Ok(parsed.access_token);
    }

    let detail = match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) => format!("{}: {}", err.error, description),
            None => err.error,
        },
        Err(_) => body.chars().take(500).collect(),
    };
    Err(SyncError::Auth(format!("Token acquisition failed ({}): {}", status, detail)).into())
}
