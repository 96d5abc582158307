//! Guild store management.
//!
//! Every guild owns its own `SQLite` database. Connections are opened lazily the first
//! time a command touches a guild, at which point all tables are created from the
//! entity definitions (`Schema::create_table_from_entity`) and the guild's economy
//! settings are seeded with the configured defaults. All connections are closed when
//! the bot shuts down.

use crate::core::settings::{self, EconomySettings};
use crate::entities::{
    Account, Bet, Betting, Condition, GuildConfig, SavedThrow, Transaction, account, bet,
};
use crate::errors::{Error, Result};
use sea_orm::sea_query::{Expr, Index};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Where guild databases live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// One `<guild id>.sqlite` file per guild in this directory
    Directory(PathBuf),
    /// Throwaway in-memory databases (tests)
    InMemory,
}

impl StoreLocation {
    /// Connection URL for a guild's database.
    #[must_use]
    pub fn url_for(&self, guild_id: u64) -> String {
        match self {
            Self::Directory(dir) => {
                format!("sqlite://{}?mode=rwc", dir.join(format!("{guild_id}.sqlite")).display())
            }
            Self::InMemory => "sqlite::memory:".to_string(),
        }
    }
}

/// Lazily opened per-guild database connections.
pub struct GuildStores {
    location: StoreLocation,
    defaults: EconomySettings,
    connections: Mutex<HashMap<u64, DatabaseConnection>>,
}

impl GuildStores {
    /// Creates the store registry, making sure the storage directory exists.
    pub fn new(location: StoreLocation, defaults: EconomySettings) -> Result<Self> {
        if let StoreLocation::Directory(dir) = &location {
            std::fs::create_dir_all(dir).map_err(|e| Error::Config {
                message: format!("Failed to create guild data directory {}: {e}", dir.display()),
            })?;
        }
        Ok(Self {
            location,
            defaults,
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Registry backed by in-memory databases.
    #[must_use]
    pub fn in_memory(defaults: EconomySettings) -> Self {
        Self {
            location: StoreLocation::InMemory,
            defaults,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the guild's connection, opening and initializing it on first use.
    #[instrument(skip(self))]
    pub async fn connection(&self, guild_id: u64) -> Result<DatabaseConnection> {
        let mut connections = self.connections.lock().await;
        if let Some(db) = connections.get(&guild_id) {
            return Ok(db.clone());
        }

        let url = self.location.url_for(guild_id);
        debug!("Opening guild store at {url}");
        let db = open_guild_database(&url, &self.defaults).await?;
        connections.insert(guild_id, db.clone());
        info!(guild_id, "Guild store ready");
        Ok(db)
    }

    /// Guilds whose store is currently open.
    pub async fn open_guilds(&self) -> Vec<u64> {
        let mut guilds: Vec<u64> = self.connections.lock().await.keys().copied().collect();
        guilds.sort_unstable();
        guilds
    }

    /// Closes every open connection. Failures are logged, the first one is returned.
    pub async fn close_all(&self) -> Result<()> {
        let drained: Vec<(u64, DatabaseConnection)> =
            self.connections.lock().await.drain().collect();
        let mut first_error = None;
        for (guild_id, db) in drained {
            if let Err(e) = db.close().await {
                warn!(guild_id, "Failed to close guild store: {e}");
                first_error.get_or_insert(Error::from(e));
            }
        }
        info!("Guild stores closed");
        first_error.map_or(Ok(()), Err)
    }
}

/// Connects to a guild database, creates missing tables and seeds default settings.
pub async fn open_guild_database(
    url: &str,
    defaults: &EconomySettings,
) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(false);
    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    settings::seed_defaults(&db, defaults).await?;
    Ok(db)
}

/// Creates all guild tables using `SeaORM`'s schema generation from entity definitions.
///
/// Statements use `IF NOT EXISTS` so reopening an existing guild file is a no-op.
/// The accounts table additionally carries `CHECK (balance >= 0)`, and bets get a
/// unique (channel, user) index.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut accounts = schema.create_table_from_entity(Account);
    accounts
        .if_not_exists()
        .check(Expr::col(account::Column::Balance).gte(0));

    let mut tables = vec![
        accounts,
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(GuildConfig),
        schema.create_table_from_entity(Condition),
        schema.create_table_from_entity(Betting),
        schema.create_table_from_entity(Bet),
        schema.create_table_from_entity(SavedThrow),
    ];
    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let bet_index = Index::create()
        .if_not_exists()
        .name("idx_bets_channel_user")
        .table(Bet)
        .col(bet::Column::ChannelId)
        .col(bet::Column::UserId)
        .unique()
        .to_owned();
    db.execute(builder.build(&bet_index)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{AccountModel, BetModel, BettingModel, TransactionModel};
    use crate::test_utils::setup_test_db;
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = setup_test_db().await?;

        // Test that tables exist by querying them
        let _: Vec<AccountModel> = Account::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<BettingModel> = Betting::find().limit(1).all(&db).await?;
        let _: Vec<BetModel> = Bet::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_negative_balance_rejected_by_storage() -> Result<()> {
        use sea_orm::{ActiveModelTrait, Set};

        let db = setup_test_db().await?;
        let result = account::ActiveModel {
            user_id: Set(1),
            balance: Set(-5),
        }
        .insert(&db)
        .await;
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_store_location_urls() {
        let dir = StoreLocation::Directory(PathBuf::from("data/guilds"));
        assert_eq!(dir.url_for(42), "sqlite://data/guilds/42.sqlite?mode=rwc");
        assert_eq!(StoreLocation::InMemory.url_for(42), "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_guild_stores_reuse_connection_and_persist() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let stores = GuildStores::new(
            StoreLocation::Directory(dir.path().to_path_buf()),
            EconomySettings::default(),
        )?;

        let first = stores.connection(7).await?;
        settings::update(&first, settings::Setting::DefaultBalance(250)).await?;
        let again = stores.connection(7).await?;
        assert_eq!(settings::load(&again).await?.default_balance, 250);
        assert_eq!(stores.open_guilds().await, vec![7]);

        stores.close_all().await?;
        assert!(stores.open_guilds().await.is_empty());
        assert!(dir.path().join("7.sqlite").exists());

        // Reopening keeps the stored setting instead of reseeding it
        let reopened = stores.connection(7).await?;
        assert_eq!(settings::load(&reopened).await?.default_balance, 250);
        stores.close_all().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_guild_stores_are_isolated() -> Result<()> {
        let stores = GuildStores::in_memory(EconomySettings::default());
        let a = stores.connection(1).await?;
        let b = stores.connection(2).await?;
        settings::update(&a, settings::Setting::Currency("€".to_string())).await?;

        assert_eq!(settings::load(&a).await?.currency, "€");
        assert_eq!(
            settings::load(&b).await?.currency,
            EconomySettings::default().currency
        );
        Ok(())
    }
}
