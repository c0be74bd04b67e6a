use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, ETAG, IF_MATCH};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use supportdesk_core::config::ServicesConfig;

use crate::auth::AuthContext;
use crate::error::GatewayError;

const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Backoff for idempotent reads. Writes are sent exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0, base_delay: Duration::ZERO }
    }

    pub fn from_config(config: &ServicesConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(MAX_RETRY_DELAY_MS);
        let mut delay = base;
        for _ in 1..attempt {
            delay = delay.saturating_mul(2);
        }
        Duration::from_millis(delay.min(MAX_RETRY_DELAY_MS))
    }
}

/// Shared request plumbing for both service clients.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthContext,
    retry: RetryPolicy,
}

impl ServiceClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: AuthContext,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|error| {
            GatewayError::Transport { url: base_url.clone(), message: error.to_string() }
        })?;
        Ok(Self { client, base_url, auth, retry })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET with retry on transport failures and 502/503/504.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.get_value(path).await?;
        decode(value)
    }

    pub(crate) async fn get_value(&self, path: &str) -> Result<Value, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.send(Method::GET, path, None::<&()>, None).await {
                Err(error) if error.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        event_name = "gateway.request.retry",
                        path,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying idempotent request"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    pub(crate) async fn send_value<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        expected_version: Option<u64>,
    ) -> Result<Value, GatewayError> {
        self.send(method, path, body, expected_version).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        expected_version: Option<u64>,
    ) -> Result<Value, GatewayError> {
        let url = self.url(path);
        let mut request = self.auth.apply(self.client.request(method.clone(), &url));
        if let Some(version) = expected_version {
            request = request.header(IF_MATCH, format!("\"{version}\""));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| GatewayError::Transport {
            url: url.clone(),
            message: error.to_string(),
        })?;
        let status = response.status();
        let etag_version = version_from_etag(response.headers());
        let text = response.text().await.map_err(|error| GatewayError::Transport {
            url: url.clone(),
            message: error.to_string(),
        })?;

        if !status.is_success() {
            let detail = normalize_detail(status, &text);
            tracing::debug!(
                event_name = "gateway.request.failed",
                method = %method,
                url = %url,
                status = status.as_u16(),
                detail = %detail,
                "service returned an error"
            );
            return Err(GatewayError::from_status(status.as_u16(), detail));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let mut value: Value = serde_json::from_str(&text)
            .map_err(|error| GatewayError::Decode(format!("{url}: {error}")))?;
        if let (Some(version), Some(object)) = (etag_version, value.as_object_mut()) {
            object.entry("version").or_insert_with(|| Value::from(version));
        }
        Ok(value)
    }

    /// Probes `GET /health` without retries.
    pub async fn health(&self) -> Result<Value, GatewayError> {
        self.send(Method::GET, "/health", None::<&()>, None).await
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|error| GatewayError::Decode(error.to_string()))
}

/// Reads `"7"`, `W/"7"` or `7` from an `ETag` header.
pub fn version_from_etag(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(ETAG)?.to_str().ok()?;
    raw.trim().trim_start_matches("W/").trim_matches('"').parse().ok()
}

/// Collapses the `detail` shapes services send (string, list of validation
/// errors, object) into one message.
pub fn normalize_detail(status: StatusCode, body: &str) -> String {
    let fallback = || {
        let text = body.trim();
        if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_owned()
        } else {
            text.to_owned()
        }
    };

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };
    match value.get("detail") {
        Some(Value::String(detail)) => detail.clone(),
        Some(Value::Array(items)) => {
            let messages: Vec<String> = items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(message) => message.to_owned(),
                    None => item.as_str().map(str::to_owned).unwrap_or_else(|| item.to_string()),
                })
                .collect();
            if messages.is_empty() {
                fallback()
            } else {
                messages.join("; ")
            }
        }
        Some(other) => other.to_string(),
        None => fallback(),
    }
}

/// Runs `apply` against the current resource; on a version conflict re-fetches
/// once and tries again.
pub async fn retry_once_on_conflict<T, R, Fetch, FetchFut, Apply, ApplyFut>(
    mut fetch: Fetch,
    mut apply: Apply,
) -> Result<R, GatewayError>
where
    Fetch: FnMut() -> FetchFut,
    FetchFut: Future<Output = Result<T, GatewayError>>,
    Apply: FnMut(T) -> ApplyFut,
    ApplyFut: Future<Output = Result<R, GatewayError>>,
{
    let current = fetch().await?;
    match apply(current).await {
        Err(error) if error.is_conflict() => {
            tracing::info!(
                event_name = "gateway.conflict.retry",
                error = %error,
                "version conflict, re-fetching once"
            );
            let fresh = fetch().await?;
            apply(fresh).await
        }
        other => other,
    }
}
