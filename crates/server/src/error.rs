//! Error responses.
//!
//! Every failure leaves the edge as `{ error, details? }` with the status
//! chosen here. Throttling responses also carry `Retry-After`.

use std::time::Duration;

use applet::{GenerationError, OperationFailure, ProviderError};
use axum::extract::rejection::JsonRejection;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway::GatewayError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: OperationFailure,
    retry_after: Option<Duration>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &OperationFailure {
        &self.body
    }

    /// A body that failed JSON extraction.
    pub fn from_rejection(rejection: &JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: OperationFailure {
                error: "Invalid JSON body".to_string(),
                details: Some(rejection.body_text()),
            },
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(after) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(after.as_secs().max(1)));
        }
        response
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let status = generation_status(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "operation failed");
        } else {
            tracing::warn!(error = %err, status = status.as_u16(), "operation rejected");
        }
        let retry_after = match &err {
            GenerationError::Provider(ProviderError::Throttled { retry_after }) => *retry_after,
            _ => None,
        };
        Self {
            status,
            body: OperationFailure::from(&err),
            retry_after,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = match &err {
            GatewayError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        Self {
            status,
            body: OperationFailure {
                error: err.to_string(),
                details: err.details().map(str::to_string),
            },
            retry_after,
        }
    }
}

fn generation_status(err: &GenerationError) -> StatusCode {
    match err {
        GenerationError::Validation { .. } => StatusCode::BAD_REQUEST,
        GenerationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GenerationError::Provider(provider) => match provider {
            ProviderError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProviderError::QuotaExhausted => StatusCode::PAYMENT_REQUIRED,
            ProviderError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProviderError::Upstream {
                status: Some(code), ..
            } if (400..600).contains(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        GenerationError::Configuration { .. }
        | GenerationError::Truncated
        | GenerationError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
