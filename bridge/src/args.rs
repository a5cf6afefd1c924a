use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};
use config::Config;
use secrecy::SecretString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogStyle {
    /// Human readable lines, colored when stderr is a terminal.
    Color,
    /// One JSON object per line.
    Json,
}

/// Anthropic Messages API in front of an OpenAI-compatible upstream.
#[derive(Debug, Parser)]
#[command(name = "messages-bridge", version)]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// IP address and port to listen on, overriding the configuration.
    #[arg(short, long, env = "BRIDGE_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,

    /// Log filter, e.g. `info` or `llm=debug,server=info`.
    #[arg(long, env = "BRIDGE_LOG", default_value = "info")]
    pub log: String,

    #[arg(long, env = "BRIDGE_LOG_STYLE", value_enum, default_value_t = LogStyle::Color)]
    pub log_style: LogStyle,

    /// Upstream API key. Without it, the key supplied by each caller is forwarded.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible upstream.
    #[arg(long, env = "OPENROUTER_BASE_URL")]
    pub base_url: Option<String>,

    /// Send every request to this upstream model, ignoring the mapping rules.
    #[arg(long, env = "MODEL_OVERRIDE")]
    pub model_override: Option<String>,
}

impl Args {
    /// Loads the configuration file, if any, and applies the command line overrides on top.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(listen_address) = self.listen_address {
            config.server.listen_address = listen_address;
        }

        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            config.upstream.api_key = Some(SecretString::from(api_key.to_string()));
        }

        if let Some(base_url) = &self.base_url {
            config.upstream.base_url = base_url.clone();
        }

        if let Some(model) = self.model_override.as_deref().filter(|model| !model.is_empty()) {
            config.models.override_model = Some(model.to_string());
        }

        config.validate()?;

        Ok(config)
    }
}
