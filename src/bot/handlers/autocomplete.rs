//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggestions are best effort: any storage failure yields an empty list rather
//! than an error shown to the user.

use crate::{
    bot::{Context, guild_database},
    core::{dice, gambling, transaction},
};
use tracing::warn;

/// Discord autocomplete limit
const MAX_SUGGESTIONS: usize = 25;
/// Latest guild transactions offered for ID completion
const TRANSACTION_SUGGESTIONS: u64 = 20;

/// Keeps the candidates containing `partial` (case-insensitive), sorted.
fn filter_candidates(candidates: impl IntoIterator<Item = String>, partial: &str) -> Vec<String> {
    let partial = partial.trim().to_lowercase();
    let mut matching: Vec<String> = candidates
        .into_iter()
        .filter(|c| c.to_lowercase().contains(&partial))
        .take(MAX_SUGGESTIONS)
        .collect();
    matching.sort();
    matching
}

/// Suggests IDs of the latest transactions of the guild.
pub async fn autocomplete_transaction_id(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Ok((_, db)) = guild_database(ctx).await else {
        return Vec::new();
    };
    match transaction::latest(&db, Some(TRANSACTION_SUGGESTIONS)).await {
        Ok(entries) => filter_candidates(entries.into_iter().map(|t| t.id), partial),
        Err(e) => {
            warn!("Transaction ID autocomplete failed: {e}");
            Vec::new()
        }
    }
}

/// Suggests the choices of the betting session running in the channel.
pub async fn autocomplete_bet_choice(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Ok((_, db)) = guild_database(ctx).await else {
        return Vec::new();
    };
    match gambling::get_session(&db, ctx.channel_id().get()).await {
        Ok(Some(session)) => filter_candidates(session.choices, partial),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Bet choice autocomplete failed: {e}");
            Vec::new()
        }
    }
}

/// Suggests names of the throws saved in the guild.
pub async fn autocomplete_throw_name(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Ok((_, db)) = guild_database(ctx).await else {
        return Vec::new();
    };
    match dice::list_throws(&db).await {
        Ok(throws) => filter_candidates(throws.into_iter().map(|(name, _)| name), partial),
        Err(e) => {
            warn!("Saved throw autocomplete failed: {e}");
            Vec::new()
        }
    }
}
