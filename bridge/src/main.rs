use args::Args;
use clap::Parser;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args);

    let config = args.config()?;

    log::info!("Messages bridge {} starting", env!("CARGO_PKG_VERSION"));
    log::debug!("Forwarding to upstream at {}", config.upstream.base_url());

    let shutdown_signal = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown_signal.clone()));

    server::serve(ServeConfig {
        listen_address: config.server.listen_address,
        config,
        shutdown_signal,
    })
    .await?;

    Ok(())
}

/// Cancels the token on Ctrl-C or SIGTERM.
async fn wait_for_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    log::info!("Shutdown signal received, draining connections");
    token.cancel();
}
