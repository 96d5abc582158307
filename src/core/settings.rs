//! Per-guild economy settings stored in the `config` table.
//!
//! Rows are plain key/value text. [`load`] overlays whatever parses onto the defaults,
//! so a missing or malformed row never breaks a command.

use crate::entities::{GuildConfig, guild_config};
use crate::errors::{Error, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait, Set};
use serde::Deserialize;
use tracing::{info, warn};

/// Key of the currency symbol row
pub const CURRENCY_KEY: &str = "Currency";
/// Key of the daily stipend amount row
pub const DAILY_AMOUNT_KEY: &str = "DailyAmount";
/// Key of the daily stipend balance cap row
pub const DAILY_LIMIT_KEY: &str = "DailyLimit";
/// Key of the default balance row
pub const DEFAULT_BALANCE_KEY: &str = "DefaultBalance";

/// Maximum number of characters of a currency symbol
pub const MAX_CURRENCY_LEN: usize = 3;

/// Economy settings of one guild.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EconomySettings {
    /// Symbol appended to amounts
    pub currency: String,
    /// Full daily stipend; 0 disables the stipend
    pub daily_amount: i64,
    /// Balance at which the stipend stops; 0 disables the stipend
    pub daily_limit: i64,
    /// Balance of newly created accounts
    pub default_balance: i64,
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            currency: "✦".to_string(),
            daily_amount: 200,
            daily_limit: 5000,
            default_balance: 100,
        }
    }
}

impl EconomySettings {
    /// Formats an amount with the guild currency, e.g. `150 ✦`.
    #[must_use]
    pub fn money(&self, amount: i64) -> String {
        format!("{amount} {}", self.currency)
    }

    /// Whether members can claim a stipend at all.
    #[must_use]
    pub const fn daily_enabled(&self) -> bool {
        self.daily_amount > 0 && self.daily_limit > 0
    }

    fn rows(&self) -> [(&'static str, String); 4] {
        [
            (CURRENCY_KEY, self.currency.clone()),
            (DAILY_AMOUNT_KEY, self.daily_amount.to_string()),
            (DAILY_LIMIT_KEY, self.daily_limit.to_string()),
            (DEFAULT_BALANCE_KEY, self.default_balance.to_string()),
        ]
    }

    fn apply_row(&mut self, key: &str, value: &str) {
        let parsed = |field: &mut i64| match value.parse() {
            Ok(number) => *field = number,
            Err(_) => warn!("Ignoring malformed setting {key} = {value:?}"),
        };
        match key {
            CURRENCY_KEY => self.currency = value.to_string(),
            DAILY_AMOUNT_KEY => parsed(&mut self.daily_amount),
            DAILY_LIMIT_KEY => parsed(&mut self.daily_limit),
            DEFAULT_BALANCE_KEY => parsed(&mut self.default_balance),
            _ => {}
        }
    }
}

/// A single settings change made by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    /// New currency symbol
    Currency(String),
    /// New full stipend
    DailyAmount(i64),
    /// New stipend cap
    DailyLimit(i64),
    /// New default balance
    DefaultBalance(i64),
}

impl Setting {
    const fn key(&self) -> &'static str {
        match self {
            Self::Currency(_) => CURRENCY_KEY,
            Self::DailyAmount(_) => DAILY_AMOUNT_KEY,
            Self::DailyLimit(_) => DAILY_LIMIT_KEY,
            Self::DefaultBalance(_) => DEFAULT_BALANCE_KEY,
        }
    }

    fn value(&self) -> String {
        match self {
            Self::Currency(symbol) => symbol.clone(),
            Self::DailyAmount(n) | Self::DailyLimit(n) | Self::DefaultBalance(n) => n.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Currency(symbol) => validate_currency(symbol),
            Self::DailyAmount(n) | Self::DailyLimit(n) | Self::DefaultBalance(n) if *n < 0 => {
                Err(Error::InvalidAmount { amount: *n })
            }
            _ => Ok(()),
        }
    }
}

/// Checks a currency symbol: printable, not blank, at most three characters.
pub fn validate_currency(symbol: &str) -> Result<()> {
    let reason = if symbol.trim().is_empty() {
        Some("it cannot be blank".to_string())
    } else if symbol.chars().any(char::is_control) {
        Some("it must be printable".to_string())
    } else if symbol.chars().count() > MAX_CURRENCY_LEN {
        Some(format!("it cannot exceed {MAX_CURRENCY_LEN} characters"))
    } else {
        None
    };
    reason.map_or(Ok(()), |reason| Err(Error::InvalidCurrency { reason }))
}

/// Reads the guild settings, falling back to defaults for missing or malformed rows.
pub async fn load<C: ConnectionTrait>(db: &C) -> Result<EconomySettings> {
    let mut settings = EconomySettings::default();
    for row in GuildConfig::find().all(db).await? {
        settings.apply_row(&row.key, &row.value);
    }
    Ok(settings)
}

/// Inserts every setting row that does not exist yet. Existing rows are left alone.
pub async fn seed_defaults<C: ConnectionTrait>(db: &C, defaults: &EconomySettings) -> Result<()> {
    for (key, value) in defaults.rows() {
        if GuildConfig::find_by_id(key).one(db).await?.is_none() {
            GuildConfig::insert(guild_config::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value),
            })
            .exec(db)
            .await?;
        }
    }
    Ok(())
}

/// Validates and stores one setting.
pub async fn update<C: ConnectionTrait>(db: &C, setting: Setting) -> Result<()> {
    setting.validate()?;
    let key = setting.key();
    let value = setting.value();

    GuildConfig::insert(guild_config::ActiveModel {
        key: Set(key.to_string()),
        value: Set(value.clone()),
    })
    .on_conflict(
        OnConflict::column(guild_config::Column::Key)
            .update_column(guild_config::Column::Value)
            .to_owned(),
    )
    .exec(db)
    .await?;

    info!("Setting {key} updated to {value:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_load_seeded_defaults() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(load(&db).await?, EconomySettings::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_reload() -> Result<()> {
        let db = setup_test_db().await?;
        update(&db, Setting::DailyAmount(0)).await?;
        update(&db, Setting::DailyLimit(900)).await?;
        update(&db, Setting::Currency("$".to_string())).await?;

        let settings = load(&db).await?;
        assert_eq!(settings.daily_amount, 0);
        assert_eq!(settings.daily_limit, 900);
        assert_eq!(settings.currency, "$");
        assert!(!settings.daily_enabled());
        assert_eq!(settings.money(12), "12 $");
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_rows() -> Result<()> {
        let db = setup_test_db().await?;
        update(&db, Setting::DefaultBalance(3)).await?;
        seed_defaults(&db, &EconomySettings::default()).await?;
        assert_eq!(load(&db).await?.default_balance, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_row_falls_back_to_default() -> Result<()> {
        let db = setup_test_db().await?;
        GuildConfig::update(guild_config::ActiveModel {
            key: Set(DAILY_LIMIT_KEY.to_string()),
            value: Set("lots".to_string()),
        })
        .exec(&db)
        .await?;

        assert_eq!(load(&db).await?.daily_limit, 5000);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_validation_keeps_stored_values() -> Result<()> {
        let db = setup_test_db().await?;

        let result = update(&db, Setting::Currency("   ".to_string())).await;
        assert!(matches!(result, Err(Error::InvalidCurrency { .. })));

        let result = update(&db, Setting::DefaultBalance(-1)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -1 })));

        assert_eq!(load(&db).await?, EconomySettings::default());
        Ok(())
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("€").is_ok());
        assert!(validate_currency("abc").is_ok());
        assert!(validate_currency("✦").is_ok());
        assert!(validate_currency("").is_err());
        assert!(validate_currency("gold").is_err());
        assert!(validate_currency("a\nb").is_err());
    }
}
