//! Outbound HTTP on behalf of generated apps.
//!
//! [`Fetcher`] is the seam between the gateway pipeline and the network;
//! [`ReqwestFetcher`] is the production adapter. Size and content-type checks
//! happen here because they must run before, and while, the body is read.

use std::collections::BTreeMap;
use std::error::Error as _;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::redirect;
use serde_json::Value;
use url::Url;

use crate::policy::{self, BlockRule};
use crate::{content, GatewayError, ProxyMethod};

/// `User-Agent` sent on every proxied request, whatever the app asked for.
pub const GATEWAY_USER_AGENT: &str = "AppForge-App/1.0";

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Request headers never forwarded from the app.
const STRIPPED_HEADERS: [&str; 11] = [
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
];

/// A validated outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: ProxyMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

/// A fully read upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    /// Lower-cased names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Performs one outbound request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Sends `request` and reads at most `max_body_bytes` of the body.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TooLarge`], [`GatewayError::UnsupportedMediaType`],
    /// [`GatewayError::Blocked`] for a redirect to a blocked target, or
    /// [`GatewayError::Upstream`] for anything else.
    async fn fetch(
        &self,
        request: FetchRequest,
        max_body_bytes: usize,
    ) -> Result<FetchedResponse, GatewayError>;
}

#[derive(Debug, thiserror::Error)]
#[error("redirect target blocked: {0}")]
struct BlockedRedirect(BlockRule);

/// [`Fetcher`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// # Errors
    ///
    /// [`GatewayError::Upstream`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, GatewayError> {
        let redirects = redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            match policy::check_url(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(rule) => attempt.error(BlockedRedirect(rule)),
            }
        });
        let client = reqwest::Client::builder()
            .redirect(redirects)
            .build()
            .map_err(|e| GatewayError::Upstream {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        request: FetchRequest,
        max_body_bytes: usize,
    ) -> Result<FetchedResponse, GatewayError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone());

        let mut has_content_type = false;
        for (name, value) in &request.headers {
            let lower = name.trim().to_ascii_lowercase();
            if STRIPPED_HEADERS.contains(&lower.as_str()) {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(lower.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                tracing::debug!(header = %lower, "dropping unrepresentable header");
                continue;
            };
            has_content_type |= name == CONTENT_TYPE;
            builder = builder.header(name, value);
        }
        builder = builder.header(USER_AGENT, GATEWAY_USER_AGENT);

        if let Some(body) = request.body.filter(|_| request.method.allows_body()) {
            let bytes = serde_json::to_vec(&body).map_err(|e| GatewayError::InvalidRequest {
                message: e.to_string(),
            })?;
            if !has_content_type {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(bytes);
        }

        let mut response = builder.send().await.map_err(send_error)?;

        if response
            .content_length()
            .is_some_and(|len| len > max_body_bytes as u64)
        {
            return Err(GatewayError::TooLarge {
                limit_bytes: max_body_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content::is_binary(&content_type) {
            return Err(GatewayError::UnsupportedMediaType { content_type });
        }

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| GatewayError::Upstream {
            details: e.to_string(),
        })? {
            if body.len() + chunk.len() > max_body_bytes {
                return Err(GatewayError::TooLarge {
                    limit_bytes: max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedResponse {
            status,
            headers,
            body,
        })
    }
}

fn send_error(err: reqwest::Error) -> GatewayError {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(BlockedRedirect(rule)) = cause.downcast_ref::<BlockedRedirect>() {
            tracing::warn!(rule = %rule, "redirect to blocked target refused");
            return GatewayError::Blocked { rule: *rule };
        }
        source = cause.source();
    }
    GatewayError::Upstream {
        details: err.to_string(),
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}
