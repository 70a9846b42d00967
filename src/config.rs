//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (CHRONOGRAPH_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [engine]
//! channel_capacity = 256
//! literal_cap_bytes = 1024
//! memoize = true
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! CHRONOGRAPH_ENGINE__CHANNEL_CAPACITY=1024
//! CHRONOGRAPH_LOGGING__LEVEL=trace
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Buffer size of the bounded channels streaming lookup results
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Byte cap enforced by the bounded literal builder
    #[serde(default = "default_literal_cap")]
    pub literal_cap_bytes: usize,

    /// Route lookups through the memoization decorator
    #[serde(default)]
    pub memoize: bool,
}

fn default_channel_capacity() -> usize {
    256
}

fn default_literal_cap() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            channel_capacity: 256,
            literal_cap_bytes: 1024,
            memoize: false,
        }
    }
}

impl EngineConfig {
    /// The literal builder callers should run ingestion through: bounded by
    /// the configured byte cap, or unbounded when the cap is zero.
    pub fn literal_builder(&self) -> crate::triple::LiteralBuilder {
        if self.literal_cap_bytes == 0 {
            crate::triple::LiteralBuilder::unbounded()
        } else {
            crate::triple::LiteralBuilder::bounded(self.literal_cap_bytes)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from config files and environment variables.
    pub fn load() -> Result<Config, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("CHRONOGRAPH_").split("__"))
            .extract()
    }
}
