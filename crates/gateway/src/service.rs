//! The gateway pipeline.
//!
//! ```text
//! Received ─▶ UrlValidated ─▶ RateChecked ─▶ Fetched ─▶ ShapeFiltered ─▶ Responded
//! ```
//!
//! URL policy runs first so blocked targets never spend a client's budget.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fetch::{FetchRequest, FetchedResponse, Fetcher};
use crate::rate_limit::{ClientKey, FixedWindowLimiter, RateLimitConfig};
use crate::{content, policy, GatewayError};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// HTTP methods an app may proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProxyMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl ProxyMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    /// Whether a JSON body is forwarded for this method.
    pub fn allows_body(self) -> bool {
        !matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(format!("unsupported method '{other}'")),
        }
    }
}

impl TryFrom<String> for ProxyMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProxyMethod> for String {
    fn from(method: ProxyMethod) -> Self {
        method.as_str().to_string()
    }
}

impl From<ProxyMethod> for reqwest::Method {
    fn from(method: ProxyMethod) -> Self {
        match method {
            ProxyMethod::Get => reqwest::Method::GET,
            ProxyMethod::Post => reqwest::Method::POST,
            ProxyMethod::Put => reqwest::Method::PUT,
            ProxyMethod::Patch => reqwest::Method::PATCH,
            ProxyMethod::Delete => reqwest::Method::DELETE,
            ProxyMethod::Head => reqwest::Method::HEAD,
        }
    }
}

/// Body of `POST /api/app-proxy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub url: String,
    #[serde(default)]
    pub method: ProxyMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl ProxyRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: ProxyMethod::Get,
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// What the app receives for a relayed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub data: Value,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl From<FetchedResponse> for ProxyResponse {
    fn from(fetched: FetchedResponse) -> Self {
        Self {
            data: content::decode_body(&fetched.body),
            status: fetched.status,
            headers: fetched.headers,
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Limits applied to every proxied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    pub rate_limit: RateLimitConfig,
    pub max_body_bytes: usize,
    /// Deadline for fetch and body read together.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Relays app network requests under policy.
pub struct Gateway {
    config: GatewayConfig,
    limiter: Arc<FixedWindowLimiter>,
    fetcher: Arc<dyn Fetcher>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            limiter: Arc::new(FixedWindowLimiter::new(config.rate_limit)),
            fetcher,
        }
    }

    pub fn config(&self) -> GatewayConfig {
        self.config
    }

    /// The limiter, for wiring up periodic eviction.
    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    /// Validates, rate-limits, fetches and shapes one proxied request.
    ///
    /// # Errors
    ///
    /// See [`GatewayError`]; each variant carries its HTTP status.
    #[tracing::instrument(
        name = "gateway.proxy",
        skip_all,
        fields(client = %client, method = %request.method)
    )]
    pub async fn proxy(
        &self,
        request: ProxyRequest,
        client: &ClientKey,
    ) -> Result<ProxyResponse, GatewayError> {
        let url = policy::validate_url(&request.url)?;
        tracing::debug!(host = url.host_str().unwrap_or(""), "target validated");

        self.limiter.check(client).map_err(|retry_after| {
            tracing::warn!(retry_after = ?retry_after, "client rate limited");
            GatewayError::RateLimited { retry_after }
        })?;

        let fetch = FetchRequest {
            url,
            method: request.method,
            headers: request.headers,
            body: request.body,
        };
        let fetched = tokio::time::timeout(
            self.config.timeout,
            self.fetcher.fetch(fetch, self.config.max_body_bytes),
        )
        .await
        .map_err(|_| GatewayError::Timeout {
            after: self.config.timeout,
        })?
        .map_err(|err| {
            tracing::warn!(error = %err, status = err.status_code(), "proxied fetch failed");
            err
        })?;

        tracing::info!(
            upstream_status = fetched.status,
            bytes = fetched.body.len(),
            "proxied request relayed"
        );
        Ok(ProxyResponse::from(fetched))
    }
}
