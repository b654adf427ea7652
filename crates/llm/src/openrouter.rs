//! OpenRouter chat-completions provider.

use std::time::Duration;

use applet::{FinishReason, Generator, Prompt, ProviderError, RawGeneratorResponse};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};

use crate::wire::{ChatMessage, ChatRequest, ChatResponse};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Connection settings for [`OpenRouterProvider`].
#[derive(Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Sent as `HTTP-Referer` for provider attribution.
    pub referer: String,
    /// Sent as `X-Title` for provider attribution.
    pub title: String,
    /// Transport-level ceiling. The orchestrator applies its own, shorter,
    /// deadline on top.
    pub request_timeout: Duration,
}

impl OpenRouterConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: "https://appforge.dev".to_string(),
            title: "AppForge".to_string(),
            request_timeout: Duration::from_secs(180),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// The key never appears in debug output.
impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// [`Generator`] backed by OpenRouter.
#[derive(Debug)]
pub struct OpenRouterProvider {
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterProvider {
    /// Builds the provider. A missing key is logged here, once; every
    /// subsequent call then fails with [`ProviderError::MissingCredential`].
    ///
    /// # Errors
    ///
    /// [`ProviderError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: OpenRouterConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        if config.api_key.is_none() {
            tracing::error!("OPENROUTER_API_KEY is not set; generation requests will fail");
        }

        Ok(Self { config, client })
    }

    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Generator for OpenRouterProvider {
    #[tracing::instrument(
        name = "llm.complete",
        skip_all,
        fields(
            model = %prompt.model,
            max_output_tokens = prompt.max_output_tokens.as_u32(),
        )
    )]
    async fn complete(&self, prompt: &Prompt) -> Result<RawGeneratorResponse, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential)?;

        let body = ChatRequest {
            model: prompt.model.as_str(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: prompt.max_output_tokens.as_u32(),
            temperature: prompt.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            let err = status_error(status, retry_after, &text);
            tracing::warn!(status = status.as_u16(), error = %err, "provider rejected request");
            return Err(err);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                ProviderError::InvalidResponse {
                    message: format!("could not decode completion: {e}"),
                }
            } else {
                transport_error(e)
            }
        })?;

        let raw = into_raw(parsed)?;
        tracing::debug!(finish = ?raw.finish, chars = raw.text.len(), "completion received");
        Ok(raw)
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        "request to provider timed out".to_string()
    } else {
        err.to_string()
    };
    ProviderError::Transport { message }
}

/// Maps a non-success status to the provider taxonomy.
pub(crate) fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED => ProviderError::Unauthorized,
        StatusCode::PAYMENT_REQUIRED => ProviderError::QuotaExhausted,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Throttled { retry_after },
        other => ProviderError::Upstream {
            status: Some(other.as_u16()),
            message: error_message(body).unwrap_or_else(|| {
                other
                    .canonical_reason()
                    .map_or_else(|| other.to_string(), str::to_string)
            }),
        },
    }
}

/// `error.message`, or `error` when it is a plain string.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

pub(crate) fn into_raw(response: ChatResponse) -> Result<RawGeneratorResponse, ProviderError> {
    if let Some(error) = response.error {
        let status = error
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u16::try_from(c).ok());
        return Err(ProviderError::Upstream {
            status,
            message: error
                .message
                .unwrap_or_else(|| "provider reported an error".to_string()),
        });
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse {
            message: "completion contained no choices".to_string(),
        })?;

    let finish = match choice.finish_reason.as_deref() {
        Some("length") => FinishReason::Truncated,
        Some("error") => FinishReason::Error,
        _ => FinishReason::Complete,
    };
    let text = choice
        .message
        .and_then(|m| m.content)
        .unwrap_or_default();

    Ok(RawGeneratorResponse::new(text, finish))
}
