//! Runtime settings read from the environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use quantpm_market_data::{AggregatorConfig, ALPHA_VANTAGE, FINNHUB};

use crate::errors::{ConfigError, Result};

/// Env file holding vendor credentials, loaded before `.env`.
pub const CREDENTIALS_ENV_FILE: &str = "credentials/.env";

const DEFAULT_APP_NAME: &str = "AutomatedQuantPM";
const DEFAULT_APP_VERSION: &str = "1.0.0";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Output format of the tracing subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                key: "LOG_FORMAT",
                value: s.to_string(),
            }),
        }
    }
}

/// Application settings.
///
/// Built once at startup and passed to whoever needs it; there is no global
/// instance.
#[derive(Clone)]
pub struct Settings {
    pub alpha_vantage_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
    /// Recognized credentials with no provider behind them yet.
    pub twelve_data_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub iex_cloud_api_key: Option<String>,

    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub log_level: String,
    pub log_format: LogFormat,

    pub host: String,
    pub port: u16,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,

    pub provider_timeout: Duration,
    pub alpha_vantage_daily_limit: u32,

    pub config_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Settings {
    /// Load `credentials/.env` and `.env`, then read the process environment.
    ///
    /// Variables already set in the environment win over both files.
    pub fn from_env() -> Result<Self> {
        if dotenvy::from_path(CREDENTIALS_ENV_FILE).is_ok() {
            debug!("Loaded {}", CREDENTIALS_ENV_FILE);
        }
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let secret = |key: &str| var(key).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let cors_allow = or("CORS_ALLOW_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            alpha_vantage_api_key: secret("ALPHA_VANTAGE_API_KEY"),
            finnhub_api_key: secret("FINNHUB_API_KEY"),
            twelve_data_api_key: secret("TWELVE_DATA_API_KEY"),
            polygon_api_key: secret("POLYGON_API_KEY"),
            iex_cloud_api_key: secret("IEX_CLOUD_API_KEY"),

            app_name: or("APP_NAME", DEFAULT_APP_NAME),
            app_version: or("APP_VERSION", DEFAULT_APP_VERSION),
            debug: parse_bool("DEBUG", var("DEBUG"))?,
            log_level: or("LOG_LEVEL", "INFO"),
            log_format: or("LOG_FORMAT", "text").parse()?,

            host: or("HOST", "0.0.0.0"),
            port: parse_or("PORT", var("PORT"), 8000)?,
            cors_allow,
            request_timeout: Duration::from_millis(parse_or(
                "REQUEST_TIMEOUT_MS",
                var("REQUEST_TIMEOUT_MS"),
                DEFAULT_TIMEOUT_MS,
            )?),

            provider_timeout: Duration::from_millis(parse_or(
                "PROVIDER_TIMEOUT_MS",
                var("PROVIDER_TIMEOUT_MS"),
                DEFAULT_TIMEOUT_MS,
            )?),
            alpha_vantage_daily_limit: parse_or(
                "ALPHA_VANTAGE_DAILY_LIMIT",
                var("ALPHA_VANTAGE_DAILY_LIMIT"),
                quantpm_market_data::DEFAULT_DAILY_CALL_LIMIT,
            )?,

            config_dir: PathBuf::from(or("CONFIG_DIR", "config")),
            static_dir: PathBuf::from(or("STATIC_DIR", "static")),
        })
    }

    /// `host:port` pair for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Inputs for the provider chain: credentials, call ceiling, timeout.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        let mut config = AggregatorConfig {
            call_timeout: self.provider_timeout,
            alpha_vantage_daily_limit: self.alpha_vantage_daily_limit,
            ..AggregatorConfig::default()
        };
        if let Some(key) = &self.alpha_vantage_api_key {
            config = config.with_credential(ALPHA_VANTAGE, key.clone());
        }
        if let Some(key) = &self.finnhub_api_key {
            config = config.with_credential(FINNHUB, key.clone());
        }
        config
    }

    /// Credential for a normalized provider name, if one is configured.
    pub fn credential_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "ALPHA_VANTAGE" => self.alpha_vantage_api_key.as_deref(),
            "FINNHUB" => self.finnhub_api_key.as_deref(),
            "TWELVE_DATA" => self.twelve_data_api_key.as_deref(),
            "POLYGON" => self.polygon_api_key.as_deref(),
            "IEX_CLOUD" => self.iex_cloud_api_key.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("Settings")
            .field("alpha_vantage_api_key", &mask(&self.alpha_vantage_api_key))
            .field("finnhub_api_key", &mask(&self.finnhub_api_key))
            .field("twelve_data_api_key", &mask(&self.twelve_data_api_key))
            .field("polygon_api_key", &mask(&self.polygon_api_key))
            .field("iex_cloud_api_key", &mask(&self.iex_cloud_api_key))
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("debug", &self.debug)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_allow", &self.cors_allow)
            .field("request_timeout", &self.request_timeout)
            .field("provider_timeout", &self.provider_timeout)
            .field("alpha_vantage_daily_limit", &self.alpha_vantage_daily_limit)
            .field("config_dir", &self.config_dir)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: v }),
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue {
            key,
            value: value.unwrap_or_default(),
        }),
    }
}
