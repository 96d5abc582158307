//! Bot layer - Discord-specific interface and command handlers
//!
//! This module wires the economy, gambling and game tools commands into a poise
//! framework, holds the state shared by every invocation and turns command errors
//! into ephemeral replies.

/// Discord command implementations (economy, bank admin, gambling, game tools, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, confirmations, pagination)
pub mod handlers;

use crate::{
    config::{database::GuildStores, settings::AppConfig},
    core::{dice::DiceThrow, ledger::Ledger},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Poise context used by every command of the bot.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Accent color of every embed
pub const EMBED_COLOR: u32 = 0x002B_2D31;

/// Reply shown when a command fails for an internal reason.
pub const INTERNAL_ERROR_REPLY: &str = "❌ Something went wrong while running this command.";

/// Shared data available to all bot commands.
pub struct BotData {
    /// Per-guild database connections
    pub stores: Arc<GuildStores>,
    /// Balance mutations and transaction retention
    pub ledger: Ledger,
    /// Application configuration loaded at startup
    pub config: Arc<AppConfig>,
    /// Last dice throw of each user, kept in memory only
    last_throws: Mutex<HashMap<u64, DiceThrow>>,
}

impl BotData {
    /// Creates the shared state from the storage, the ledger and the configuration.
    #[must_use]
    pub fn new(stores: Arc<GuildStores>, ledger: Ledger, config: Arc<AppConfig>) -> Self {
        Self {
            stores,
            ledger,
            config,
            last_throws: Mutex::new(HashMap::new()),
        }
    }

    /// Remembers `throw` as the last throw of `user_id`.
    pub async fn remember_throw(&self, user_id: u64, throw: DiceThrow) {
        self.last_throws.lock().await.insert(user_id, throw);
    }

    /// Last throw rolled by `user_id` since the bot started.
    pub async fn last_throw(&self, user_id: u64) -> Option<DiceThrow> {
        self.last_throws.lock().await.get(&user_id).cloned()
    }
}

/// Guild of the invocation and its database connection.
///
/// Fails with [`Error::GuildOnly`] in direct messages.
pub async fn guild_database(ctx: Context<'_>) -> Result<(u64, DatabaseConnection)> {
    let guild_id = ctx.guild_id().ok_or(Error::GuildOnly)?.get();
    let db = ctx.data().stores.connection(guild_id).await?;
    Ok((guild_id, db))
}

/// Rejects bot users as account holders with [`Error::BotAccount`].
pub fn ensure_account_holder(user: &serenity::User) -> Result<()> {
    if user.bot {
        Err(Error::BotAccount)
    } else {
        Ok(())
    }
}

/// Sends a reply only the invoking user can see.
pub async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<()> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Appends the non-fatal `warnings` collected while handling a command, one per line.
#[must_use]
pub fn with_warnings(message: &str, warnings: &[&str]) -> String {
    warnings
        .iter()
        .fold(message.to_string(), |text, warning| format!("{text}\n⚠️ {warning}"))
}

/// Text shown to the user for a failed command.
#[must_use]
pub fn error_reply(error: &Error) -> String {
    if error.is_user_facing() {
        format!("❌ {error}")
    } else {
        INTERNAL_ERROR_REPLY.to_string()
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let command = &ctx.command().qualified_name;
            if error.is_user_facing() {
                debug!("Command `{command}` rejected: {error}");
            } else {
                error!("Error in command `{command}`: {error:?}");
            }
            if let Err(e) = reply_ephemeral(ctx, error_reply(&error)).await {
                error!("Failed to send error message: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connects to Discord and serves commands until Ctrl-C.
///
/// Commands are registered in the development guild when one is configured,
/// globally otherwise.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    config: Arc<AppConfig>,
    stores: Arc<GuildStores>,
    ledger: Ledger,
) -> Result<()> {
    let dev_guild = config.bot.dev_guild_id;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                let commands = &framework.options().commands;
                if let Some(guild_id) = dev_guild {
                    poise::builtins::register_in_guild(
                        ctx,
                        commands,
                        serenity::GuildId::new(guild_id),
                    )
                    .await?;
                    info!("Registered {} commands in guild {guild_id}", commands.len());
                } else {
                    poise::builtins::register_globally(ctx, commands).await?;
                    info!("Registered {} commands globally", commands.len());
                }
                Ok(BotData::new(stores, ledger, config))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {e:?}"))?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down shards");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {e:?}"))?;
    Ok(())
}
