//! Stripe REST client.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so provider
//! calls suspend the runner instead of blocking the runtime. One client is
//! built at process start and shared by the event fetcher and the timelines.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::traits::{EventLog, EventPage, EventQuery};

/// API version the recorded fixtures were generated against.
pub const DEFAULT_API_VERSION: &str = "2020-08-27";

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Connection settings for [`StripeClient`], from the `[stripe]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub api_base: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        StripeConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Form-encoded request parameters, in insertion order.
///
/// Nested fields use Stripe's bracket syntax: `card[number]`,
/// `metadata[tid]`, `payment_method_types[0]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    /// Shorthand for `metadata[<key>]`.
    pub fn metadata(self, key: &str, value: impl ToString) -> Self {
        self.set(format!("metadata[{}]", key), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

struct Inner {
    agent: ureq::Agent,
    secret_key: String,
    api_base: String,
    api_version: String,
}

/// Shared Stripe API client. Cheap to clone.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base)
            .field("api_version", &self.inner.api_version)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_config(secret_key, &StripeConfig::default())
    }

    /// Build a client. Proxy settings are read from the environment
    /// (`http_proxy` / `https_proxy`) by the HTTP agent.
    pub fn with_config(secret_key: impl Into<String>, config: &StripeConfig) -> Self {
        if let Ok(proxy) = std::env::var("http_proxy").or_else(|_| std::env::var("https_proxy")) {
            tracing::info!(%proxy, "stripe client using proxy from environment");
        }

        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        StripeClient {
            inner: Arc::new(Inner {
                agent: ureq::Agent::new_with_config(agent_config),
                secret_key: secret_key.into(),
                api_base: config.api_base.trim_end_matches('/').to_string(),
                api_version: config.api_version.clone(),
            }),
        }
    }

    /// `POST /v1/<resource>`.
    pub async fn create(&self, resource: &str, params: Params) -> Result<Value, ProviderError> {
        self.send(Method::Post, format!("/v1/{}", resource), params)
            .await
    }

    /// `POST /v1/<resource>/<id>`.
    pub async fn update(
        &self,
        resource: &str,
        id: &str,
        params: Params,
    ) -> Result<Value, ProviderError> {
        self.send(Method::Post, format!("/v1/{}/{}", resource, id), params)
            .await
    }

    /// `POST /v1/<resource>/<id>/<action>`, e.g. `payment_intents/pi_1/confirm`.
    pub async fn act(
        &self,
        resource: &str,
        id: &str,
        action: &str,
        params: Params,
    ) -> Result<Value, ProviderError> {
        self.send(
            Method::Post,
            format!("/v1/{}/{}/{}", resource, id, action),
            params,
        )
        .await
    }

    /// `GET /v1/<resource>/<id>`.
    pub async fn retrieve(&self, resource: &str, id: &str) -> Result<Value, ProviderError> {
        self.send(Method::Get, format!("/v1/{}/{}", resource, id), Params::new())
            .await
    }

    /// `GET /v1/<resource>` with query parameters.
    pub async fn list(&self, resource: &str, params: Params) -> Result<Value, ProviderError> {
        self.send(Method::Get, format!("/v1/{}", resource), params)
            .await
    }

    /// `DELETE /v1/<resource>/<id>`.
    pub async fn delete(&self, resource: &str, id: &str) -> Result<Value, ProviderError> {
        self.send(
            Method::Delete,
            format!("/v1/{}/{}", resource, id),
            Params::new(),
        )
        .await
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        params: Params,
    ) -> Result<Value, ProviderError> {
        tracing::debug!(method = method.as_str(), %path, "stripe request");
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.send_blocking(method, &path, &params))
            .await
            .map_err(|e| ProviderError::Join(e.to_string()))?
    }
}

impl Inner {
    fn send_blocking(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.api_base, path);
        let auth = format!("Bearer {}", self.secret_key);

        let result = match method {
            Method::Get => self
                .agent
                .get(&url)
                .header("Authorization", &auth)
                .header("Stripe-Version", &self.api_version)
                .query_pairs(params.iter())
                .call(),
            Method::Post => self
                .agent
                .post(&url)
                .header("Authorization", &auth)
                .header("Stripe-Version", &self.api_version)
                .send_form(params.iter()),
            Method::Delete => self
                .agent
                .delete(&url)
                .header("Authorization", &auth)
                .header("Stripe-Version", &self.api_version)
                .call(),
        };

        let response = result.map_err(|e| ProviderError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body: Value = response
            .into_body()
            .read_json()
            .map_err(|e| ProviderError::Decode {
                path: path.to_string(),
                message: format!("failed to parse response as JSON: {}", e),
            })?;

        if (200..300).contains(&status) {
            return Ok(body);
        }

        let (message, code) = match serde_json::from_value::<ErrorEnvelope>(body) {
            Ok(envelope) => (
                envelope
                    .error
                    .message
                    .unwrap_or_else(|| "no error message".to_string()),
                envelope.error.code,
            ),
            Err(_) => ("unrecognised error body".to_string(), None),
        };
        Err(ProviderError::Api {
            method: method.as_str(),
            path: path.to_string(),
            status,
            code,
            message,
        })
    }
}

impl EventQuery {
    fn to_params(&self) -> Params {
        let mut params = Params::new().set("limit", self.limit);
        if let Some(id) = &self.starting_after {
            params = params.set("starting_after", id);
        }
        if let Some(id) = &self.ending_before {
            params = params.set("ending_before", id);
        }
        if let Some(ts) = self.created_gte {
            params = params.set("created[gte]", ts);
        }
        params
    }
}

#[async_trait]
impl EventLog for StripeClient {
    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, ProviderError> {
        let value = self.list("events", query.to_params()).await?;
        serde_json::from_value(value).map_err(|e| ProviderError::Decode {
            path: "/v1/events".to_string(),
            message: e.to_string(),
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
