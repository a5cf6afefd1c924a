//! HTTP server of the messages bridge.

mod error;

use std::net::SocketAddr;

use axum::{Json, Router, http::Uri, routing::get};
use config::Config;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Name reported by the health endpoints.
const SERVICE_NAME: &str = "messages-bridge";

pub struct ServeConfig {
    pub listen_address: SocketAddr,
    pub config: Config,
    /// Cancelling this token stops accepting connections and drains the open ones.
    pub shutdown_signal: CancellationToken,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
    }: ServeConfig,
) -> crate::Result<()> {
    let app = router(&config).await?;

    let listener = TcpListener::bind(listen_address).await.map_err(Error::Bind)?;

    log::info!("Messages endpoint available at: http://{listen_address}/v1/messages");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal.cancelled_owned())
        .await
        .map_err(Error::Server)?;

    log::info!("Server stopped");

    Ok(())
}

/// The full application: health checks, the messages endpoints and a not-found fallback.
async fn router(config: &Config) -> crate::Result<Router> {
    let messages = llm::router(config).await.map_err(|e| Error::Router(e.to_string()))?;

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(messages)
        .fallback(not_found);

    Ok(app)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found(uri: Uri) -> llm::LlmError {
    log::debug!("No route for {uri}");
    llm::LlmError::NotFound(format!("No route for {}", uri.path()))
}
