use log::{info, warn};

use crate::errors::Result;
use crate::files::{AppConfig, InstrumentCatalog, APP_CONFIG_FILE, INSTRUMENTS_FILE};
use crate::settings::Settings;

/// Providers that work without an API key.
const KEYLESS_PROVIDERS: &[&str] = &["YAHOO"];
/// Providers the aggregator can actually build.
const SUPPORTED_PROVIDERS: &[&str] = &["YAHOO", "ALPHA_VANTAGE", "FINNHUB"];

/// Everything the service reads at startup.
#[derive(Clone, Debug)]
pub struct ConfigSource {
    pub settings: Settings,
    pub instruments: InstrumentCatalog,
    pub app_config: AppConfig,
}

impl ConfigSource {
    /// Settings from the environment plus the files under `CONFIG_DIR`.
    pub fn load() -> Result<Self> {
        Self::with_settings(Settings::from_env()?)
    }

    pub fn with_settings(settings: Settings) -> Result<Self> {
        let instruments = InstrumentCatalog::load(&settings.config_dir.join(INSTRUMENTS_FILE))?;
        let app_config = AppConfig::load(&settings.config_dir.join(APP_CONFIG_FILE))?;
        info!(
            "Loaded {} watch-list instruments from {}",
            instruments.watchlist().len(),
            settings.config_dir.display()
        );
        Ok(Self {
            settings,
            instruments,
            app_config,
        })
    }

    pub fn watchlist(&self) -> Vec<String> {
        self.instruments.watchlist()
    }

    /// Enabled providers the service cannot honour: no adapter exists, or
    /// the required key is missing. Each entry is `(name, reason)`.
    pub fn unusable_providers(&self) -> Vec<(String, &'static str)> {
        self.app_config
            .enabled_providers()
            .into_iter()
            .map(|entry| entry.normalized_name())
            .filter_map(|name| {
                if !SUPPORTED_PROVIDERS.contains(&name.as_str()) {
                    Some((name, "no adapter available"))
                } else if !KEYLESS_PROVIDERS.contains(&name.as_str())
                    && self.settings.credential_for(&name).is_none()
                {
                    Some((name, "API key not configured"))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Log a warning for each enabled provider that will not be used.
    pub fn warn_unusable_providers(&self) {
        for (name, reason) in self.unusable_providers() {
            warn!("Provider '{}' is enabled but unusable: {}", name, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_config_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(INSTRUMENTS_FILE),
            "default_watchlist = [\"SPY\", \"QQQ\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(APP_CONFIG_FILE),
            r#"
[[data.providers]]
name = "yahoo"
enabled = true

[[data.providers]]
name = "finnhub"
enabled = true

[[data.providers]]
name = "twelve_data"
enabled = true
"#,
        )
        .unwrap();

        let env: HashMap<&str, String> = HashMap::from([
            ("CONFIG_DIR", dir.path().display().to_string()),
            ("TWELVE_DATA_API_KEY", "td".to_string()),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).cloned()).unwrap();
        let source = ConfigSource::with_settings(settings).unwrap();

        assert_eq!(source.watchlist(), vec!["SPY", "QQQ"]);
        assert_eq!(
            source.unusable_providers(),
            vec![
                ("FINNHUB".to_string(), "API key not configured"),
                ("TWELVE_DATA".to_string(), "no adapter available"),
            ]
        );
    }
}
