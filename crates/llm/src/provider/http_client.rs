use std::time::Duration;

use reqwest::Client;

/// Client builder shared by all upstream calls.
///
/// `timeout` covers the whole request, including reading a full stream.
pub(super) fn default_http_client_builder(mut headers: http::HeaderMap, timeout: Duration) -> reqwest::ClientBuilder {
    headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(timeout)
        // Idle connections are dropped quickly so DNS changes of the upstream get picked up.
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
}
