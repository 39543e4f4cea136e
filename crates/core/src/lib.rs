//! QuantPM configuration sources.
//!
//! [`Settings`] come from the environment (with `credentials/.env` and `.env`
//! loaded first); the instrument catalogue and the enabled-provider list come
//! from TOML files under the config directory. [`ConfigSource`] bundles all
//! three for the binaries.

pub mod errors;
pub mod files;
pub mod settings;
mod source;

pub use errors::{ConfigError, Result};
pub use files::{AppConfig, InstrumentCatalog, ProviderEntry};
pub use settings::{LogFormat, Settings};
pub use source::ConfigSource;
