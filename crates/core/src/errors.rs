//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Type alias for Result using the configuration error type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Failures while loading settings or configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}
