//! Gateway failure taxonomy.
//!
//! Every variant maps to exactly one HTTP status; the `Display` text is the
//! message returned to the running app.

use std::time::Duration;

use applet::RetryPolicy;
use thiserror::Error;

use crate::policy::BlockRule;

const MIB: usize = 1024 * 1024;

/// Everything that can stop a proxied request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The proxy request body itself is unusable.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the body.
        message: String,
    },

    /// The target is not a parseable absolute URL.
    #[error("Invalid URL format")]
    InvalidUrl,

    /// The target matched a block rule.
    #[error("Access to this URL is blocked for security reasons")]
    Blocked {
        /// The rule that matched.
        rule: BlockRule,
    },

    /// The client used up its request budget for the current window.
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited {
        /// Time until the window resets.
        retry_after: Duration,
    },

    /// Fetch and read did not finish within the deadline.
    #[error("Request timeout ({}s limit)", .after.as_secs())]
    Timeout {
        /// The configured deadline.
        after: Duration,
    },

    /// The response exceeded the size ceiling.
    #[error("Response too large (max {}MB)", .limit_bytes / MIB)]
    TooLarge {
        /// The configured ceiling.
        limit_bytes: usize,
    },

    /// The response declared a binary content type.
    #[error("Binary content types are not allowed")]
    UnsupportedMediaType {
        /// The declared content type.
        content_type: String,
    },

    /// Any other fetch failure.
    #[error("Failed to fetch data")]
    Upstream {
        /// Underlying failure, surfaced as `details`.
        details: String,
    },
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } | Self::InvalidUrl => 400,
            Self::Blocked { .. } => 403,
            Self::Timeout { .. } => 408,
            Self::TooLarge { .. } => 413,
            Self::UnsupportedMediaType { .. } => 415,
            Self::RateLimited { .. } => 429,
            Self::Upstream { .. } => 500,
        }
    }

    /// Extra detail for the response body, when there is any.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Upstream { details } => Some(details),
            Self::InvalidRequest { message } => Some(message),
            _ => None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: Some(*retry_after),
            },
            Self::Timeout { .. } | Self::Upstream { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}
