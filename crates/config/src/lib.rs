//! Configuration for the messages bridge.

mod error;
mod loader;
mod models;
mod server;
mod upstream;

use std::path::Path;

use serde::Deserialize;

pub use error::Error;
pub use models::{ModelFilter, ModelMatcher, ModelRule, ModelsConfig};
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;

pub(crate) type Result<T> = std::result::Result<T, error::Error>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

impl Config {
    /// Reads, expands and validates a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Config> {
        loader::load(path)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn parse(content: &str) -> crate::Result<Config> {
        loader::parse(content)
    }

    /// Validates a configuration assembled or modified in code.
    pub fn validate(&self) -> crate::Result<()> {
        loader::validate(self)
    }
}
