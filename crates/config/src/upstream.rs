//! Settings for the OpenAI-compatible upstream the bridge forwards to.

use std::time::Duration;

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;

pub(crate) const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Upstream chat completions provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Key sent as a bearer token. When unset, the key supplied by the caller is forwarded.
    pub api_key: Option<SecretString>,
    /// Total time allowed for one upstream request, including a full stream.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Value of the `HTTP-Referer` attribution header.
    pub referer: Option<String>,
    /// Value of the `X-Title` attribution header.
    pub title: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
            referer: None,
            title: None,
        }
    }
}

impl UpstreamConfig {
    /// The base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
