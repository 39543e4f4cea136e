//! TOML configuration files under the config directory.
//!
//! Both files are optional. A missing file loads as empty; a file that
//! exists but does not parse is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

pub const INSTRUMENTS_FILE: &str = "instruments.toml";
pub const APP_CONFIG_FILE: &str = "config.toml";

const WATCHLIST_KEY: &str = "default_watchlist";

/// Read and deserialize a TOML file, or fall back to the default if absent.
fn read_toml<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found, using empty configuration", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Instrument catalogue: the watch-list plus free-form instrument tables.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct InstrumentCatalog(toml::Table);

impl InstrumentCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    /// Symbols under `default_watchlist`, in file order.
    ///
    /// Non-string entries are ignored.
    pub fn watchlist(&self) -> Vec<String> {
        self.0
            .get(WATCHLIST_KEY)
            .and_then(toml::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(toml::Value::as_str)
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Catalogue as JSON for the HTTP surface.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }
}

/// One `[[data.providers]]` entry.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ProviderEntry {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

impl ProviderEntry {
    /// Upper-case, underscore-separated provider name (`alpha-vantage` ->
    /// `ALPHA_VANTAGE`). `yfinance` is an alias for `YAHOO`.
    pub fn normalized_name(&self) -> String {
        let name: String = self
            .name
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match name.as_str() {
            "YFINANCE" | "YAHOO_FINANCE" => "YAHOO".to_string(),
            "ALPHAVANTAGE" => "ALPHA_VANTAGE".to_string(),
            _ => name,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DataSection {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

/// Contents of `config.toml`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataSection,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    pub fn enabled_providers(&self) -> Vec<&ProviderEntry> {
        self.data.providers.iter().filter(|p| p.enabled).collect()
    }
}
