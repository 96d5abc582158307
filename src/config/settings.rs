//! Application configuration loading from config.toml
//!
//! Every section is optional: a missing file or a missing key falls back to the
//! built-in defaults. The `[economy]` section provides the values each new guild
//! store is seeded with, after which guild administrators own them.

use crate::core::settings::EconomySettings;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_VAR: &str = "ANALOG_CONFIG";
/// Environment variable overriding the guild data directory
pub const DATA_DIR_VAR: &str = "GUILD_DATA_DIR";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Guild store location
    pub storage: StorageConfig,
    /// Defaults seeded into each guild
    pub economy: EconomySettings,
    /// Ledger housekeeping
    pub ledger: LedgerConfig,
    /// Discord-side options
    pub bot: BotConfig,
}

/// `[storage]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one database file per guild
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/guilds"),
        }
    }
}

/// `[ledger]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Transactions older than this many days are purged
    pub retention_days: u32,
    /// Minimum number of seconds between two purges
    pub cleanup_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_days: 14,
            cleanup_interval_secs: 3600,
        }
    }
}

impl LedgerConfig {
    /// Retention window as a chrono duration.
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Minimum time between purges.
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// `[bot]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Register commands in this guild only (instant updates while developing)
    pub dev_guild_id: Option<u64>,
}

/// Loads configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or its TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the configuration the bot runs with.
///
/// Reads the file named by `ANALOG_CONFIG` (default `./config.toml`). A missing file
/// yields the defaults, an unreadable one is an error. `GUILD_DATA_DIR` then
/// overrides the storage directory.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        info!("Loading configuration from {path}");
        load_config(&path)?
    } else {
        warn!("No configuration file at {path}, using defaults");
        AppConfig::default()
    };

    if let Ok(dir) = std::env::var(DATA_DIR_VAR) {
        config.storage.data_dir = PathBuf::from(dir);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [storage]
            data_dir = "/var/lib/analog"

            [economy]
            currency = "€"
            daily_amount = 50
            daily_limit = 1000
            default_balance = 10

            [ledger]
            retention_days = 30
            cleanup_interval_secs = 60

            [bot]
            dev_guild_id = 1234
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/analog"));
        assert_eq!(config.economy.currency, "€");
        assert_eq!(config.economy.daily_amount, 50);
        assert_eq!(config.economy.daily_limit, 1000);
        assert_eq!(config.economy.default_balance, 10);
        assert_eq!(config.ledger.retention(), chrono::Duration::days(30));
        assert_eq!(config.ledger.cleanup_interval(), Duration::from_secs(60));
        assert_eq!(config.bot.dev_guild_id, Some(1234));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("[economy]\ndaily_amount = 75\n").unwrap();
        assert_eq!(config.economy.daily_amount, 75);
        assert_eq!(config.economy.daily_limit, 5000);
        assert_eq!(config.economy.default_balance, 100);
        assert_eq!(config.storage.data_dir, PathBuf::from("data/guilds"));
        assert_eq!(config.ledger.retention_days, 14);
        assert_eq!(config.ledger.cleanup_interval_secs, 3600);
        assert!(config.bot.dev_guild_id.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = parse_config("[economy\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ndata_dir = \"guilds\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("guilds"));
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let result = load_config("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
