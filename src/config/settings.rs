//! Service settings file

use crate::controller::ControllerConfig;
use crate::engine::EngineConfig;
use crate::publisher::DEFAULT_DISCORD_API_URL;
use crate::store::StoreConfig;
use crate::{Result, RosterError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Title used when a target is configured without one
pub const DEFAULT_TITLE: &str = "Midair 2 Public Server List";

/// Environment variables holding the bot token, in lookup order
pub const TOKEN_ENV_VARS: [&str; 2] = ["DISCORD_TOKEN", "TOKEN"];

/// Runtime settings
///
/// Loaded from ~/.config/rosterwatch/config.yaml; selected fields can be
/// overridden from the environment. The bot token is never part of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Server status endpoint
    #[serde(default)]
    pub api_url: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// Targets reconciled at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_title")]
    pub default_title: String,

    #[serde(default = "default_discord_api_url")]
    pub discord_api_url: String,

    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_path() -> PathBuf {
    StoreConfig::default().path
}

fn default_tick_interval_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_publish_timeout_secs() -> u64 {
    15
}

fn default_max_concurrency() -> usize {
    crate::engine::DEFAULT_MAX_CONCURRENCY
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_discord_api_url() -> String {
    DEFAULT_DISCORD_API_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            db_path: default_db_path(),
            tick_interval_secs: default_tick_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            default_title: default_title(),
            discord_api_url: default_discord_api_url(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RosterError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading settings");

        let content = fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save settings to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving settings");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/rosterwatch/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("rosterwatch");
        path.push("config.yaml");
        path
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`
    ///
    /// Where two variables name the same setting the first one set wins.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(*key));

        if let Some(url) = first(&["ROSTERWATCH_API_URL", "MIDAIR_SERVERS_API_URL"]) {
            self.api_url = url;
        }
        if let Some(path) = first(&["ROSTERWATCH_DB_PATH", "DB_NAME"]) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(secs) = first(&["ROSTERWATCH_TICK_SECS"]) {
            self.tick_interval_secs = secs.trim().parse().map_err(|_| {
                RosterError::Config(format!("ROSTERWATCH_TICK_SECS is not a number: {}", secs))
            })?;
        }
        Ok(())
    }

    /// Check the settings, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        super::validation::validate_settings(self).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            RosterError::Config(messages.join("; "))
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.db_path.clone(),
            ..Default::default()
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrency: self.max_concurrency,
            publish_timeout: self.publish_timeout(),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::new(self.tick_interval())
    }

    /// Bot token from the environment
    pub fn discord_token() -> Result<String> {
        token_from(|key| std::env::var(key).ok())
    }
}

fn token_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|key| lookup(*key))
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
        .ok_or_else(|| {
            RosterError::Config(format!(
                "Discord bot token not set (expected {})",
                TOKEN_ENV_VARS.join(" or ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.tick_interval(), Duration::from_secs(10));
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(settings.publish_timeout(), Duration::from_secs(15));
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.default_title, "Midair 2 Public Server List");
        assert_eq!(settings.discord_api_url, "https://discord.com/api/v10");
        assert!(settings.db_path.ends_with(".config/rosterwatch/rosterwatch.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_yaml::from_str("api_url: https://example.com/servers\ntick_interval_secs: 30\n")
                .unwrap();
        assert_eq!(settings.api_url, "https://example.com/servers");
        assert_eq!(settings.tick_interval_secs, 30);
        assert_eq!(settings.publish_timeout_secs, 15);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.yaml");

        let settings = Settings {
            api_url: "https://example.com/servers".to_string(),
            max_concurrency: 8,
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.yaml");
        assert!(matches!(Settings::load(&path), Err(RosterError::Config(_))));
        assert_eq!(Settings::load_or_default(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("MIDAIR_SERVERS_API_URL", "https://fallback.example/servers"),
            ("ROSTERWATCH_API_URL", "https://primary.example/servers"),
            ("DB_NAME", "/tmp/roster.db"),
            ("ROSTERWATCH_TICK_SECS", " 30 "),
        ]);
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| vars.get(key).cloned())
            .unwrap();

        assert_eq!(settings.api_url, "https://primary.example/servers");
        assert_eq!(settings.db_path, PathBuf::from("/tmp/roster.db"));
        assert_eq!(settings.tick_interval_secs, 30);
    }

    #[test]
    fn test_bad_tick_override_errors() {
        let vars = env(&[("ROSTERWATCH_TICK_SECS", "soon")]);
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|key| vars.get(key).cloned())
            .unwrap_err();
        assert!(matches!(err, RosterError::Config(_)));
    }

    #[test]
    fn test_token_lookup() {
        let vars = env(&[("TOKEN", "abc")]);
        assert_eq!(token_from(|key| vars.get(key).cloned()).unwrap(), "abc");

        let vars = env(&[("DISCORD_TOKEN", "  "), ("TOKEN", "abc")]);
        assert_eq!(token_from(|key| vars.get(key).cloned()).unwrap(), "abc");

        let vars = env(&[]);
        assert!(token_from(|key| vars.get(key).cloned()).is_err());
    }

    #[test]
    fn test_conversions() {
        let settings = Settings {
            max_concurrency: 2,
            publish_timeout_secs: 3,
            tick_interval_secs: 7,
            ..Default::default()
        };
        assert_eq!(settings.engine_config().max_concurrency, 2);
        assert_eq!(
            settings.engine_config().publish_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(
            settings.controller_config().tick_interval,
            Duration::from_secs(7)
        );
        assert!(settings.store_config().wal_mode);
    }
}
