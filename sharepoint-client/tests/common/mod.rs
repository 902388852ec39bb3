//! Shared fixtures for integration tests: a mock identity endpoint and a
//! client wired against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sharepoint_client::{
    AuthConfig, ClientConfig, RetryPolicy, SharePointClient, TokenManager,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "test-tenant";

/// Mount a token endpoint that always succeeds with a long-lived token.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Retry policy with millisecond delays so exhaustion tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(50),
    }
}

/// Build a client whose site and identity endpoints both point at `server`.
pub fn client_for(server: &MockServer, retry: RetryPolicy) -> Arc<SharePointClient> {
    let auth = TokenManager::new(
        AuthConfig::new(TENANT, "client-id", "client-secret", server.uri())
            .with_authority_host(server.uri()),
    )
    .unwrap();
    let config = ClientConfig::new(server.uri()).with_retry(retry);
    Arc::new(SharePointClient::new(config, Arc::new(auth)).unwrap())
}
