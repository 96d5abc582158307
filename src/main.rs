#![allow(clippy::result_large_err)]

use analog_bot::{
    bot,
    config::{
        database::{GuildStores, StoreLocation},
        settings::load_app_config,
    },
    core::ledger::{Ledger, RetentionPolicy},
    errors::{Error, Result},
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = load_app_config()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;
    info!("Successfully processed application configuration.");

    // 4. Open the guild stores (one SQLite file per guild, created lazily)
    let stores = GuildStores::new(
        StoreLocation::Directory(app_config.storage.data_dir.clone()),
        app_config.economy.clone(),
    )
    .inspect(|_| {
        info!(
            "Guild data directory ready at {}",
            app_config.storage.data_dir.display()
        );
    })
    .inspect_err(|e| error!("Failed to prepare guild stores: {}", e))?;
    let stores = Arc::new(stores);

    // 5. Ledger with its retention sweep
    let ledger = Ledger::new(RetentionPolicy {
        retention: app_config.ledger.retention(),
        interval: app_config.ledger.cleanup_interval(),
    });

    // 6. Run the bot
    // DISCORD_BOT_TOKEN is loaded here, directly before use, not stored in AppConfig
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    let result = bot::run_bot(token, Arc::new(app_config), Arc::clone(&stores), ledger).await;

    // 7. Close every guild database, even when the bot stopped on an error
    if let Err(e) = stores.close_all().await {
        error!("Failed to close guild databases: {}", e);
    }
    result
}
