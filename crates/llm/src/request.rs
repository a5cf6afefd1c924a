use axum::http::{HeaderMap, header::AUTHORIZATION};
use secrecy::SecretString;

/// Header Anthropic clients put their key in.
const API_KEY_HEADER: &str = "x-api-key";

/// Runtime context for upstream requests.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestContext {
    /// Key supplied by the caller. Used only when no upstream key is configured.
    pub api_key: Option<SecretString>,
}

/// Extracts the request context from the incoming headers.
///
/// `x-api-key` wins over an `Authorization: Bearer` token.
pub(crate) fn extract_context(headers: &HeaderMap) -> RequestContext {
    let api_key = header_value(headers, API_KEY_HEADER)
        .or_else(|| {
            header_value(headers, AUTHORIZATION.as_str()).and_then(|value| {
                value
                    .strip_prefix("Bearer ")
                    .or_else(|| value.strip_prefix("bearer "))
                    .map(str::trim)
            })
        })
        .filter(|key| !key.is_empty())
        .map(|key| SecretString::from(key.to_string()));

    RequestContext { api_key }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
