//! Client-credentials authentication with a cached bearer token
//!
//! The [`TokenManager`] owns the only piece of shared mutable state in the
//! crate: the cached [`Credential`]. The cache is an atomic pointer swap;
//! concurrent callers near expiry may race to refresh, which is fine because
//! the exchange is idempotent.
//!
//! Identity-endpoint failures propagate unchanged. Retrying happens at the
//! data-call layer only, so backoff never compounds across the two.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Refresh this long before the credential actually expires, so in-flight
/// requests never carry a token that lapses mid-call.
const REFRESH_MARGIN_SECS: i64 = 300;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// A bearer credential and its expiry.
#[derive(Debug, Clone)]
pub struct Credential {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// Settings for the client-credentials exchange.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Site URL the token scope is derived from (`https://<host>/.default`).
    pub site_url: String,
    /// Identity authority; overridable so tests can stand in a local endpoint.
    pub authority_host: String,
}

impl AuthConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            site_url: site_url.into(),
            authority_host: DEFAULT_AUTHORITY.to_string(),
        }
    }

    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Validate all settings at once, reporting every missing value.
    fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.site_url.trim().is_empty() {
            missing.push("site_url");
        }
        if self.tenant_id.trim().is_empty() {
            missing.push("tenant_id");
        }
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        if !missing.is_empty() {
            return Err(ApiError::configuration(format!(
                "Missing required authentication settings: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    fn scope(&self) -> Result<String> {
        let url = Url::parse(&self.site_url).map_err(|err| {
            ApiError::configuration(format!("Invalid site URL '{}': {err}", self.site_url))
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| ApiError::configuration("Site URL has no host"))?;
        Ok(format!("{}://{}/.default", url.scheme(), host))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Acquires and caches bearer credentials for the remote platform.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    config: AuthConfig,
    cached: ArcSwapOption<Credential>,
}

impl TokenManager {
    pub fn new(config: AuthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            cached: ArcSwapOption::empty(),
        })
    }

    /// Return the cached credential, refreshing when it is within the
    /// safety margin of expiry.
    pub async fn get_token(&self) -> Result<Credential> {
        if let Some(credential) = self.cached.load_full() {
            if !credential.needs_refresh() {
                return Ok((*credential).clone());
            }
        }

        let credential = self.request_token().await?;
        self.cached.store(Some(Arc::new(credential.clone())));
        Ok(credential)
    }

    /// Drop the cached credential; the next `get_token` refreshes.
    pub fn clear_cache(&self) {
        self.cached.store(None);
    }

    /// Expiry of the currently cached credential, for monitoring.
    pub fn token_expiration(&self) -> Option<DateTime<Utc>> {
        self.cached.load_full().map(|c| c.expires_at)
    }

    async fn request_token(&self) -> Result<Credential> {
        let scope = self.config.scope()?;
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let description = body["error_description"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("token request failed");
            return Err(ApiError::new(
                format!("Authentication failed: {description}"),
                Some(status.as_u16()),
                "AUTH_TOKEN_FAILED",
                false,
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|err| {
            ApiError::new(
                format!("Invalid token response: {err}"),
                None,
                "AUTH_TOKEN_FAILED",
                false,
            )
        })?;

        debug!(
            "acquired access token for {}, expires in {}s",
            scope, token.expires_in
        );

        Ok(Credential {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}
