mod upstream;

use std::{net::SocketAddr, str::FromStr, sync::Once, time::Duration};

use config::Config;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use logforth::{append::Stderr, filter::EnvFilter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use upstream::{ReceivedRequest, Reply, UpstreamMock};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        logforth::builder()
            .dispatch(|d| {
                let filter = EnvFilter::from_str("llm=debug,server=debug,config=debug,integration_tests=debug")
                    .expect("test filter should be valid");

                d.filter(filter).append(Stderr::default())
            })
            .apply();
    });
}

/// Test client for making HTTP requests to the test server
#[derive(Clone)]
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a POST request to the given path with JSON body
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request to the given path, returning Result instead of panicking
    pub async fn try_get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(format!("{}{}", self.base_url, path)).send().await
    }

    /// Get the base URL of this test client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// One server-sent event of a messages stream.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// The `event:` field.
    pub event: String,
    pub data: Value,
}

/// Builder for messages requests with fluent API for headers
pub struct MessagesRequest<'a> {
    test_server: &'a TestServer,
    request: Value,
    headers: HeaderMap,
}

impl MessagesRequest<'_> {
    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        let header_name = HeaderName::from_bytes(key.as_bytes()).unwrap();
        let header_value = HeaderValue::from_str(value).unwrap();
        self.headers.insert(header_name, header_value);
        self
    }

    async fn send_request(self) -> reqwest::Response {
        let url = format!("{}/v1/messages", self.test_server.client.base_url);

        self.test_server
            .client
            .client
            .post(&url)
            .headers(self.headers)
            .json(&self.request)
            .send()
            .await
            .unwrap()
    }

    /// Send the request and return the response, asserting success
    pub async fn send(self) -> Value {
        let response = self.send_request().await;
        let status = response.status();

        #[allow(clippy::panic)]
        if status != 200 {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error".to_string());
            panic!("Expected 200 status, got {status}: {error_text}");
        }

        response.json().await.unwrap()
    }

    /// Send the request and return status code and body (for error testing)
    pub async fn send_raw(self) -> (u16, Value) {
        let response = self.send_request().await;
        let status = response.status().as_u16();
        let body = response.json().await.unwrap();

        (status, body)
    }

    /// Send the request with `stream: true` and collect every event
    pub async fn stream(mut self) -> Vec<StreamEvent> {
        self.request["stream"] = Value::Bool(true);

        let response = self.send_request().await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");

        response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                let event = event.ok()?;

                // Keep-alive comments carry no data
                if event.data.is_empty() {
                    return None;
                }

                Some(StreamEvent {
                    event: event.event,
                    data: serde_json::from_str(&event.data).unwrap(),
                })
            })
            .collect()
            .await
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    /// Configuration used by this test server
    pub config: Config,
    upstream_tokens: Vec<CancellationToken>,
    _task_handle: tokio::task::JoinHandle<()>,
    shutdown_signal: CancellationToken,
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    /// Start a server in front of `upstream` with the given extra configuration
    pub async fn with_upstream(upstream: &UpstreamMock, config: &str) -> Self {
        let mut builder = Self::builder();
        builder.spawn_upstream(upstream).await;
        builder.build(config).await
    }

    /// Start a new test server with the given TOML configuration
    #[allow(clippy::panic)]
    async fn start(config_toml: &str, upstream_tokens: Vec<CancellationToken>) -> Self {
        init_logger();

        // Write config to a temporary file and use the proper loader to ensure validation
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, config_toml).unwrap();

        let config = Config::load(&config_path).unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let shutdown_signal = CancellationToken::new();

        let serve_config = ServeConfig {
            listen_address: address,
            config: config.clone(),
            shutdown_signal: shutdown_signal.clone(),
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();

        let task_handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        let client = TestClient::new(format!("http://{address}"));

        // Verify the server is actually running by making a simple request
        let mut last_error = None;

        for _ in 0..50 {
            if let Ok(Err(e)) = rx.try_recv() {
                panic!("Server failed to start: {e}");
            }

            match client.try_get("/health").await {
                Ok(_) => {
                    return TestServer {
                        client,
                        address,
                        config,
                        upstream_tokens,
                        _task_handle: task_handle,
                        shutdown_signal,
                    };
                }
                Err(e) => last_error = Some(e),
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        panic!("Server failed to become ready after 50 retries. Last error: {last_error:?}");
    }

    /// Create a messages request builder
    pub fn messages(&self, request: Value) -> MessagesRequest<'_> {
        MessagesRequest {
            test_server: self,
            request,
            headers: HeaderMap::new(),
        }
    }

    /// Count tokens for a request, asserting success
    pub async fn count_tokens(&self, request: Value) -> Value {
        let response = self.client.post("/v1/messages/count_tokens", &request).await;
        assert_eq!(response.status(), 200);

        response.json().await.unwrap()
    }

    /// Fetch a JSON document, returning status code and body
    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(path).await;
        let status = response.status().as_u16();

        (status, response.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for token in &self.upstream_tokens {
            token.cancel();
        }

        self.shutdown_signal.cancel();
    }
}

#[derive(Default)]
pub struct TestServerBuilder {
    upstream_url: Option<String>,
    upstream_tokens: Vec<CancellationToken>,
}

impl TestServerBuilder {
    /// Spawn a mock upstream and point the bridge at it
    pub async fn spawn_upstream(&mut self, upstream: &UpstreamMock) {
        let (base_url, token) = upstream.spawn().await;

        self.upstream_url = Some(base_url);
        self.upstream_tokens.push(token);
    }

    /// Build the server from the given TOML configuration.
    ///
    /// Unless the configuration says otherwise, the bridge talks to the spawned upstream with
    /// the key `test-key` and does not discover models.
    pub async fn build(self, config: &str) -> TestServer {
        let mut document: toml::Table = toml::from_str(config).unwrap();

        let upstream = table(&mut document, "upstream");

        if let Some(url) = self.upstream_url {
            upstream.entry("base_url").or_insert(toml::Value::String(url));
        }

        upstream
            .entry("api_key")
            .or_insert(toml::Value::String("test-key".to_string()));

        // An empty key means: forward the caller's key
        if upstream.get("api_key").and_then(toml::Value::as_str) == Some("") {
            upstream.remove("api_key");
        }

        table(&mut document, "models")
            .entry("discover")
            .or_insert(toml::Value::Boolean(false));

        let config = toml::to_string(&document).unwrap();

        TestServer::start(&config, self.upstream_tokens).await
    }
}

fn table<'a>(document: &'a mut toml::Table, name: &str) -> &'a mut toml::Table {
    document
        .entry(name)
        .or_insert_with(|| toml::Value::Table(toml::Table::new()))
        .as_table_mut()
        .unwrap()
}
