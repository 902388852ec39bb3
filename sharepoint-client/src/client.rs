//! Resilient HTTP transport for the SharePoint REST API
//!
//! [`SharePointClient`] owns everything below the service layer: bearer
//! injection, verbose-OData headers, the retry loop, response-envelope
//! unwrapping and error classification. Services compose endpoints and
//! payloads; they never see raw `reqwest` types except for streaming
//! downloads.
//!
//! Retry semantics: throttling (429) and transient server failures (503/504)
//! are retried with exponential backoff, honoring a `Retry-After` header when
//! the platform sends one. `max_retries` counts re-attempts, so an exhausted
//! operation has made `max_retries + 1` requests in total. Token acquisition
//! failures are never retried here.

use std::sync::Arc;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, Response};
use serde_json::{json, Value};

use crate::auth::TokenManager;
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{ApiError, Result};

const VERBOSE_JSON: &str = "application/json;odata=verbose";

/// Statuses worth re-attempting: throttling and transient upstream failures.
const TRANSIENT_STATUSES: [u16; 3] = [429, 503, 504];

/// Request body, cloned per attempt so the retry loop can resend.
#[derive(Debug, Clone)]
enum Payload {
    None,
    Json(Value),
    Bytes(Vec<u8>),
}

/// HTTP client with bearer auth, verbose-OData headers and retry.
pub struct SharePointClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<TokenManager>,
    retry: RetryPolicy,
}

impl SharePointClient {
    pub fn new(config: ClientConfig, auth: Arc<TokenManager>) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.site_url.trim_end_matches('/').to_string(),
            auth,
            retry: config.retry,
        })
    }

    /// Site base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an endpoint, unwrapping the verbose `d` envelope.
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        let response = self
            .send_with_retry(Method::GET, endpoint, read_headers(), Payload::None)
            .await?;
        unwrap_json(response).await
    }

    /// POST a JSON body (or none), unwrapping the verbose `d` envelope.
    pub async fn post(&self, endpoint: &str, body: Option<Value>) -> Result<Value> {
        let payload = match body {
            Some(value) => Payload::Json(value),
            None => Payload::None,
        };
        let response = self
            .send_with_retry(Method::POST, endpoint, write_headers(), payload)
            .await?;
        unwrap_json(response).await
    }

    /// Partial update via the platform's MERGE verb tunneled over POST.
    pub async fn merge(&self, endpoint: &str, body: Value) -> Result<()> {
        self.send_with_retry(Method::POST, endpoint, merge_headers(), Payload::Json(body))
            .await?;
        Ok(())
    }

    /// DELETE an endpoint unconditionally (`IF-MATCH: *`).
    pub async fn delete(&self, endpoint: &str) -> Result<()> {
        self.send_with_retry(Method::DELETE, endpoint, delete_headers(), Payload::None)
            .await?;
        Ok(())
    }

    /// POST raw bytes, for file uploads.
    pub async fn upload(&self, endpoint: &str, data: &[u8], file_name: &str) -> Result<Value> {
        debug!("uploading {file_name} ({} bytes)", data.len());
        let mut headers = read_headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        let response = self
            .send_with_retry(Method::POST, endpoint, headers, Payload::Bytes(data.to_vec()))
            .await?;
        unwrap_json(response).await
    }

    /// GET an endpoint returning the raw response, for file downloads.
    pub async fn download(&self, endpoint: &str) -> Result<Response> {
        self.send_with_retry(Method::GET, endpoint, HeaderMap::new(), Payload::None)
            .await
    }

    /// Fetch a request digest from the context-info endpoint. Some on-premise
    /// deployments require it on writes even with bearer auth.
    pub async fn get_form_digest(&self) -> Result<String> {
        let value = self.post("/_api/contextinfo", None).await?;
        value
            .pointer("/GetContextWebInformation/FormDigestValue")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::new(
                    "Context info response missing form digest",
                    None,
                    "INVALID_RESPONSE",
                    false,
                )
            })
    }

    async fn send_with_retry(
        &self,
        method: Method,
        endpoint: &str,
        headers: HeaderMap,
        payload: Payload,
    ) -> Result<Response> {
        let url = join_url(&self.base_url, endpoint);
        let mut attempt: u32 = 0;

        loop {
            // Re-read per attempt; a long backoff can outlive the credential.
            let token = self.auth.get_token().await?;

            let mut request = self
                .http
                .request(method.clone(), &url)
                .headers(headers.clone())
                .bearer_auth(&token.value);
            request = match &payload {
                Payload::None => request,
                Payload::Json(body) => request.json(body),
                Payload::Bytes(data) => request.body(data.clone()),
            };

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => classify_error(response).await,
                Err(err) => ApiError::from(err),
            };

            if error.is_retryable && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for(attempt, error.retry_after_seconds);
                warn!(
                    "{method} {endpoint} failed ({}), retrying in {delay:?} (attempt {}/{})",
                    error.message,
                    attempt + 1,
                    self.retry.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(error);
        }
    }
}

/// Join a base URL and an endpoint path, tolerating slashes on either side.
fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

fn read_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(VERBOSE_JSON));
    headers
}

fn write_headers() -> HeaderMap {
    let mut headers = read_headers();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(VERBOSE_JSON));
    headers
}

fn merge_headers() -> HeaderMap {
    let mut headers = write_headers();
    headers.insert("IF-MATCH", HeaderValue::from_static("*"));
    headers.insert("X-HTTP-Method", HeaderValue::from_static("MERGE"));
    headers
}

fn delete_headers() -> HeaderMap {
    let mut headers = read_headers();
    headers.insert("IF-MATCH", HeaderValue::from_static("*"));
    headers
}

/// Parse a response body, unwrapping the verbose `d` envelope when present.
/// `204 No Content` yields an empty object; non-JSON bodies (the item-count
/// endpoint returns plain text) come back as a JSON string.
async fn unwrap_json(response: Response) -> Result<Value> {
    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return Ok(json!({}));
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"));

    if !is_json {
        let text = response.text().await?;
        return Ok(Value::String(text));
    }

    let value: Value = response.json().await?;
    Ok(unwrap_envelope(value))
}

fn unwrap_envelope(mut value: Value) -> Value {
    if let Some(object) = value.as_object_mut() {
        if object.len() == 1 {
            if let Some(inner) = object.remove("d") {
                return inner;
            }
        }
    }
    value
}

/// Build an [`ApiError`] from a non-success response: status classification,
/// `Retry-After` extraction, and the platform's error body when parseable.
async fn classify_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();
    let (message, error_code) = parse_error_body(&body, status);

    let mut error = ApiError::new(
        message,
        Some(status),
        error_code,
        TRANSIENT_STATUSES.contains(&status),
    );
    error.retry_after_seconds = retry_after;
    error
}

/// Extract message and code from an error body. The platform speaks two
/// dialects: `{"error": {...}}` and `{"odata.error": {...}}`, with the
/// message either a plain string or a localized `{"value": "..."}` object.
fn parse_error_body(body: &str, status: u16) -> (String, String) {
    let fallback = (format!("Request failed: {status}"), format!("HTTP_{status}"));

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback;
    };
    let Some(error) = value.get("error").or_else(|| value.get("odata.error")) else {
        return fallback;
    };

    let message = error
        .pointer("/message/value")
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback.0);
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback.1);

    (message, code)
}
