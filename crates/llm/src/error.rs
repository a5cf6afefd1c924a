use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::messages::anthropic::AnthropicError;

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Status code Anthropic uses for `overloaded_error`.
const OVERLOADED: u16 = 529;

/// Bridge errors with appropriate HTTP status codes.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request could not be parsed or was rejected upstream as invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected API key.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The key is valid but not allowed to perform the request.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Model not found at the upstream.
    #[error("{0}")]
    ModelNotFound(String),

    /// Unknown route.
    #[error("{0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// The upstream reports it cannot take more load.
    #[error("Upstream overloaded: {0}")]
    Overloaded(String),

    /// Upstream returned an error status without a dedicated variant.
    #[error("Provider API error ({status}): {message}")]
    ProviderApiError { status: u16, message: String },

    /// Network or connection error, including failures while reading a stream.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The upstream answered with a payload that does not follow the protocol.
    #[error("Invalid upstream response: {0}")]
    InvalidUpstreamResponse(String),

    /// Internal server error.
    /// If Some(message), it came from the upstream and can be shown.
    /// If None, it's an internal error and should not leak details.
    #[error("Internal server error")]
    InternalError(Option<String>),
}

impl LlmError {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::ModelNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Overloaded(_) => StatusCode::from_u16(OVERLOADED).unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
            Self::ConnectionError(_) | Self::InvalidUpstreamResponse(_) | Self::ProviderApiError { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the Anthropic error type string for the response.
    pub fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::AuthenticationFailed(_) => "authentication_error",
            Self::PermissionDenied(_) => "permission_error",
            Self::ModelNotFound(_) | Self::NotFound(_) => "not_found_error",
            Self::RateLimitExceeded { .. } => "rate_limit_error",
            Self::Overloaded(_) => "overloaded_error",
            Self::ProviderApiError { .. }
            | Self::ConnectionError(_)
            | Self::InvalidUpstreamResponse(_)
            | Self::InternalError(_) => "api_error",
        }
    }

    /// Message that is safe to expose to API consumers.
    pub fn client_message(&self) -> String {
        match self {
            Self::InternalError(Some(provider_msg)) => provider_msg.clone(),
            Self::InternalError(None) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Maps an upstream error status and body to an error.
    pub(crate) fn from_upstream(status: u16, body: String) -> Self {
        let message = upstream_error_message(&body).unwrap_or(body);

        match status {
            400 | 413 | 422 => LlmError::InvalidRequest(message),
            401 => LlmError::AuthenticationFailed(message),
            402 | 403 => LlmError::PermissionDenied(message),
            404 => LlmError::ModelNotFound(message),
            429 => LlmError::RateLimitExceeded { message },
            OVERLOADED => LlmError::Overloaded(message),
            500 => LlmError::InternalError(Some(message)),
            _ => LlmError::ProviderApiError { status, message },
        }
    }
}

/// Pulls `error.message` out of an OpenAI-style error body.
fn upstream_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    value
        .pointer("/error/message")
        .and_then(|message| message.as_str())
        .map(str::to_string)
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = AnthropicError::from(&self);

        (status, Json(body)).into_response()
    }
}
