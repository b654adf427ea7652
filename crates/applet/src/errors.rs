//! Error and retry-policy types for the AppForge generation domain.
//!
//! [`GenerationError`] is the single failure type returned by the orchestrator.
//! It wraps the component-level errors: [`ProviderError`] for upstream
//! generator failures and [`ParseError`] for responses that do not satisfy the
//! wire contract.
//!
//! [`RetryPolicy`] is a cross-cutting concern: every error type here reports
//! one so the caller can decide whether to try again. Nothing in this workspace
//! retries a generator call on its own; a billed generator without a clear
//! success signal must not be re-invoked behind the caller's back.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: timeouts, throttling, truncated or malformed output
///   (the generator is non-deterministic; the next attempt may conform).
/// - `NonRetryable` errors: missing credentials, invalid caller input,
///   authorization and quota failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without the caller changing something.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Operation-level errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong between issuing a [`crate::GenerationRequest`]
/// and holding a [`crate::ParsedResult`].
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// The provider credential is missing or unusable.
    ///
    /// Fatal for the process configuration; surfaced once at startup and then
    /// on every request until the operator fixes it.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The caller's request is invalid (bad kind/inputs combination, short
    /// description, missing artifact or command).
    #[error("Validation error: {message}")]
    Validation {
        /// What the caller must change.
        message: String,
    },

    /// The generator provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The generator stopped at the output budget ceiling.
    ///
    /// Never parsed: a truncated artifact looks like markup but is unusable.
    #[error("Response was too long and got truncated. Please try with a smaller app.")]
    Truncated,

    /// The generator's text does not satisfy the wire contract.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The generator did not answer within the configured deadline.
    #[error("Generation timed out after {after:?}")]
    Timeout {
        /// The deadline that expired.
        after: Duration,
    },
}

impl GenerationError {
    /// Shorthand for [`GenerationError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`GenerationError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether and when the caller may try again.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Configuration { .. } | Self::Validation { .. } => RetryPolicy::NonRetryable,
            Self::Provider(e) => e.retry_policy(),
            Self::Parse(e) => e.retry_policy(),
            Self::Truncated | Self::Timeout { .. } => RetryPolicy::Retryable { after: None },
        }
    }
}

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::Generator`] implementation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    /// No API key was configured for the provider.
    #[error("API key not configured")]
    MissingCredential,

    /// The provider rejected the credential (HTTP 401).
    #[error("Invalid API key. Please check your provider API key.")]
    Unauthorized,

    /// The account has no credits left (HTTP 402).
    #[error("Insufficient credits. Please check your provider account.")]
    QuotaExhausted,

    /// The provider is throttling this account (HTTP 429).
    #[error("Rate limit exceeded. Please try again in a moment.")]
    Throttled {
        /// Delay advertised by the provider, if any.
        retry_after: Option<Duration>,
    },

    /// Any other non-success response, or a failure reported mid-generation.
    #[error("Generator request failed: {message}")]
    Upstream {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// The provider's own message when it could be parsed, else the status text.
        message: String,
    },

    /// The provider answered with a body this adapter cannot decode.
    #[error("Invalid response from generator: {message}")]
    InvalidResponse {
        /// Decoder failure description.
        message: String,
    },

    /// The provider answered successfully but with no text.
    #[error("No content generated")]
    EmptyContent,

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Failed to reach generator: {message}")]
    Transport {
        /// Transport failure description.
        message: String,
    },
}

impl ProviderError {
    /// Whether and when the caller may try again.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::MissingCredential | Self::Unauthorized | Self::QuotaExhausted => {
                RetryPolicy::NonRetryable
            }
            Self::Throttled { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Upstream { status, .. } => match status {
                Some(s) if (400..500).contains(s) && *s != 408 => RetryPolicy::NonRetryable,
                _ => RetryPolicy::Retryable { after: None },
            },
            Self::InvalidResponse { .. } | Self::EmptyContent | Self::Transport { .. } => {
                RetryPolicy::Retryable { after: None }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Which rule of the wire grammar a malformed response broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    /// A section's begin marker has no matching end marker.
    UnterminatedSection,
    /// A section's end marker appears without its begin marker.
    UnopenedSection,
    /// No artifact text remains once the sections are consumed.
    EmptyArtifact,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnterminatedSection => "section is missing its end marker",
            Self::UnopenedSection => "end marker has no matching begin marker",
            Self::EmptyArtifact => "is empty",
        })
    }
}

/// The generator's text could not be turned into a [`crate::ParsedResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// The text violates the delimiter grammar.
    #[error("Generated output is malformed: {section} {reason}")]
    Malformed {
        /// The section involved (e.g. `"DESCRIPTION"`, or `"ARTIFACT"` for the
        /// trailing markup).
        section: String,
        /// The broken rule.
        reason: MalformedReason,
    },

    /// The artifact opens a document but never closes it; the output was most
    /// likely cut short.
    #[error("Generated HTML is incomplete and missing closing tags. The response may have been truncated.")]
    Incomplete,
}

impl ParseError {
    /// Whether and when the caller may try again.
    ///
    /// Both variants are user-actionable "try again" failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::Retryable { after: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_configuration_are_not_retryable() {
        assert_eq!(
            GenerationError::validation("x").retry_policy(),
            RetryPolicy::NonRetryable
        );
        assert_eq!(
            GenerationError::from(ProviderError::MissingCredential).retry_policy(),
            RetryPolicy::NonRetryable
        );
    }

    #[test]
    fn throttling_carries_provider_delay() {
        let err = GenerationError::from(ProviderError::Throttled {
            retry_after: Some(Duration::from_secs(7)),
        });
        assert_eq!(
            err.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn upstream_client_errors_are_final() {
        let bad_request = ProviderError::Upstream {
            status: Some(400),
            message: "model not found".into(),
        };
        assert!(!bad_request.retry_policy().is_retryable());

        let outage = ProviderError::Upstream {
            status: Some(503),
            message: "overloaded".into(),
        };
        assert!(outage.retry_policy().is_retryable());
    }

    #[test]
    fn truncation_and_incomplete_output_are_distinct() {
        let truncated = GenerationError::Truncated;
        let incomplete = GenerationError::from(ParseError::Incomplete);
        assert_ne!(truncated, incomplete);
        assert!(truncated.retry_policy().is_retryable());
        assert!(incomplete.retry_policy().is_retryable());
    }
}
