//! Gambling Discord commands - `/gamble` sessions and `/bet`.
//!
//! State changes always go through the core gambling module first. Touching the board
//! message afterwards (posting, pinning, editing, deleting) is best effort: a failure
//! is logged and reported as a warning, the committed state change stands.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData, Context, EMBED_COLOR, guild_database,
            handlers::{
                autocomplete,
                confirm::{PromptLabels, confirm},
            },
            reply_ephemeral, with_warnings,
        },
        core::{
            AccountKey,
            format::capitalize,
            gambling::{self, BetPlan, NewSession, Session},
            settings::{self, EconomySettings},
        },
        entities::bet,
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use sea_orm::ConnectionTrait;
    use tracing::warn;

    const POST_WARNING: &str = "The board could not be posted in this channel.";
    const PIN_WARNING: &str = "The board could not be pinned. Check that I have the Manage Messages permission here and that fewer than 50 messages are pinned.";
    const UNPIN_WARNING: &str = "The board could not be unpinned. Check that I have the Manage Messages permission here.";
    const LINK_WARNING: &str = "The board could not be linked to the session and will not be updated.";
    const EDIT_WARNING: &str = "The board could not be updated.";
    const DELETE_WARNING: &str = "The board could not be deleted.";

    /// Create and manage betting sessions.
    #[poise::command(
        slash_command,
        guild_only,
        subcommands("gamble_start", "gamble_stop", "gamble_cancel", "gamble_list")
    )]
    pub async fn gamble(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Betting sessions. Available subcommands:\n\
            `/gamble start <title> <choices> [minimal_bet]` - Open a session in this channel\n\
            `/gamble stop <result>` - Close the session and pay the winners\n\
            `/gamble cancel` - Cancel the session and refund every bet\n\
            `/gamble list` - List the sessions running on this server";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Opens a betting session in this channel.
    #[poise::command(slash_command, guild_only, rename = "start")]
    pub async fn gamble_start(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Title of the session (up to 100 characters)"] title: String,
        #[description = "2 to 4 choices separated by commas, vertical bars or semicolons"]
        choices: String,
        #[description = "Smallest accepted stake (defaults to 1)"]
        #[min = 1]
        minimal_bet: Option<i64>,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let channel_id = ctx.channel_id();

        let session = gambling::open_session(
            &db,
            NewSession {
                channel_id: channel_id.get(),
                title: title.trim(),
                choices: &choices,
                minimal_bet: minimal_bet.unwrap_or(1),
                author_id: ctx.author().id.get(),
            },
        )
        .await?;
        let economy = settings::load(&db).await?;

        let mut warnings = Vec::new();
        let board = serenity::CreateMessage::new().embed(board_embed(&session, &[], &economy, None));
        match channel_id.send_message(ctx.http(), board).await {
            Ok(message) => {
                link_board(&db, channel_id.get(), message.id.get(), &mut warnings).await;
                if let Err(e) = message.pin(ctx.http()).await {
                    warn!("Failed to pin the board in channel {channel_id}: {e}");
                    warnings.push(PIN_WARNING);
                }
            }
            Err(e) => {
                warn!("Failed to post the board in channel {channel_id}: {e}");
                warnings.push(POST_WARNING);
            }
        }

        reply_ephemeral(
            ctx,
            with_warnings(
                "**Session opened** · Members can now bet with `/bet`.",
                &warnings,
            ),
        )
        .await
    }

    /// Closes the session of this channel and pays the winners.
    #[poise::command(slash_command, guild_only, rename = "stop")]
    pub async fn gamble_stop(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Winning choice"]
        #[autocomplete = "autocomplete::autocomplete_bet_choice"]
        result: String,
    ) -> Result<()> {
        let (guild_id, db) = guild_database(ctx).await?;
        let channel_id = ctx.channel_id();
        let session = gambling::require_session(&db, channel_id.get()).await?;
        if !can_manage(ctx, &session).await {
            return reply_ephemeral(
                ctx,
                "❌ Only the author of the session or a moderator can stop it.",
            )
            .await;
        }
        let result = session.validate_choice(&result)?;

        let answer = confirm(
            ctx,
            format!(
                "Close **{}** and announce `{}` as the result?",
                session.title,
                capitalize(&result)
            ),
            PromptLabels {
                confirm: "Close",
                cancel: "Keep open",
            },
        )
        .await?;
        if !answer.is_confirmed() {
            return reply_ephemeral(ctx, answer.abort_message("The session is still open."))
                .await;
        }

        let resolution =
            gambling::resolve_session(&ctx.data().ledger, &db, guild_id, channel_id.get(), &result)
                .await?;
        let economy = settings::load(&db).await?;

        let mut warnings = Vec::new();
        if let Some(message_id) = resolution.session.message_id {
            let message_id = serenity::MessageId::new(message_id);
            let edit = serenity::EditMessage::new().embed(board_embed(
                &resolution.session,
                &resolution.bets,
                &economy,
                Some(&resolution.result),
            ));
            if let Err(e) = channel_id.edit_message(ctx.http(), message_id, edit).await {
                warn!("Failed to update the board in channel {channel_id}: {e}");
                warnings.push(EDIT_WARNING);
            }
            if let Err(e) = channel_id.unpin(ctx.http(), message_id).await {
                warn!("Failed to unpin the board in channel {channel_id}: {e}");
                warnings.push(UNPIN_WARNING);
            }
        }

        let mut results = board_embed(
            &resolution.session,
            &resolution.bets,
            &economy,
            Some(&resolution.result),
        )
        .author(serenity::CreateEmbedAuthor::new("Betting closed · Results"));
        let announcement = if resolution.payouts.is_empty() {
            format!(
                "# Betting closed · `{}`\nNobody bet on `{}`, there is no winner.",
                resolution.session.title,
                capitalize(&resolution.result)
            )
        } else {
            let winners: Vec<String> = resolution
                .payouts
                .iter()
                .map(|p| format!("<@{}> · **+{}**", p.user_id, economy.money(p.amount)))
                .collect();
            let mentions: Vec<String> = resolution
                .payouts
                .iter()
                .map(|p| format!("<@{}>", p.user_id))
                .collect();
            results = results.field(
                if winners.len() > 1 { "Winners" } else { "Winner" },
                winners.join("\n"),
                false,
            );
            format!(
                "# Betting closed · `{}`\n{}",
                resolution.session.title,
                mentions.join(" ")
            )
        };

        ctx.send(
            poise::CreateReply::default()
                .content(announcement)
                .embed(results),
        )
        .await?;
        if !warnings.is_empty() {
            reply_ephemeral(ctx, with_warnings("**Session closed**", &warnings)).await?;
        }
        Ok(())
    }

    /// Cancels the session of this channel and refunds every bet.
    #[poise::command(slash_command, guild_only, rename = "cancel")]
    pub async fn gamble_cancel(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (guild_id, db) = guild_database(ctx).await?;
        let channel_id = ctx.channel_id();
        let session = gambling::require_session(&db, channel_id.get()).await?;
        if !can_manage(ctx, &session).await {
            return reply_ephemeral(
                ctx,
                "❌ Only the author of the session or a moderator can cancel it.",
            )
            .await;
        }

        let answer = confirm(
            ctx,
            format!(
                "Cancel **{}** and refund every bettor?",
                session.title
            ),
            PromptLabels {
                confirm: "Refund",
                cancel: "Keep open",
            },
        )
        .await?;
        if !answer.is_confirmed() {
            return reply_ephemeral(ctx, answer.abort_message("The session is still open."))
                .await;
        }

        let cancellation =
            gambling::cancel_session(&ctx.data().ledger, &db, guild_id, channel_id.get()).await?;

        let mut warnings = Vec::new();
        if let Some(message_id) = cancellation.session.message_id {
            if let Err(e) = channel_id
                .delete_message(ctx.http(), serenity::MessageId::new(message_id))
                .await
            {
                warn!("Failed to delete the board in channel {channel_id}: {e}");
                warnings.push(DELETE_WARNING);
            }
        }

        let refunded = cancellation.refunds.len();
        ctx.say(format!(
            "**Session cancelled** · `{}` was cancelled, {refunded} bettor{} refunded.",
            cancellation.session.title,
            if refunded == 1 { " was" } else { "s were" }
        ))
        .await?;
        if !warnings.is_empty() {
            reply_ephemeral(ctx, with_warnings("**Session cancelled**", &warnings)).await?;
        }
        Ok(())
    }

    /// Lists the betting sessions running on this server.
    #[poise::command(slash_command, guild_only, rename = "list")]
    pub async fn gamble_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let sessions = gambling::list_sessions(&db).await?;
        if sessions.is_empty() {
            return reply_ephemeral(ctx, "No betting session is running on this server.").await;
        }

        let economy = settings::load(&db).await?;
        let mut lines = Vec::with_capacity(sessions.len());
        for session in &sessions {
            let pot: i64 = gambling::bets(&db, session.channel_id)
                .await?
                .iter()
                .map(|b| b.amount)
                .sum();
            let choices: Vec<String> = session.choices.iter().map(|c| capitalize(c)).collect();
            lines.push(format!(
                "<#{}> · **{}** · {} · pot {}",
                session.channel_id,
                session.title,
                choices.join(" / "),
                economy.money(pot)
            ));
        }

        let embed = serenity::CreateEmbed::default()
            .title("Running betting sessions")
            .description(lines.join("\n"))
            .color(EMBED_COLOR);
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Bets on a choice of the session running in this channel.
    #[poise::command(slash_command, guild_only)]
    pub async fn bet(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Choice to bet on"]
        #[autocomplete = "autocomplete::autocomplete_bet_choice"]
        choice: String,
        #[description = "Amount to stake"]
        #[min = 1]
        amount: i64,
    ) -> Result<()> {
        let (guild_id, db) = guild_database(ctx).await?;
        let channel_id = ctx.channel_id();
        let key = AccountKey::new(guild_id, ctx.author().id.get());
        let economy = settings::load(&db).await?;

        let (_, normalized, plan) =
            gambling::plan_bet(&db, key, channel_id.get(), &choice, amount).await?;
        if let BetPlan::TopUp { current } = plan {
            let answer = confirm(
                ctx,
                format!(
                    "You already bet **{}** on `{}`. Add **{}** to your bet?",
                    economy.money(current),
                    capitalize(&normalized),
                    economy.money(amount)
                ),
                PromptLabels {
                    confirm: "Add",
                    cancel: "Cancel",
                },
            )
            .await?;
            if !answer.is_confirmed() {
                return reply_ephemeral(ctx, answer.abort_message("Your bet was not changed."))
                    .await;
            }
        }

        let placed = gambling::place_bet(
            &ctx.data().ledger,
            &db,
            key,
            channel_id.get(),
            &normalized,
            amount,
        )
        .await?;

        let mut warnings = Vec::new();
        if let Some(message_id) = placed.session.message_id {
            let bets = gambling::bets(&db, channel_id.get()).await?;
            let edit =
                serenity::EditMessage::new().embed(board_embed(&placed.session, &bets, &economy, None));
            if let Err(e) = channel_id
                .edit_message(ctx.http(), serenity::MessageId::new(message_id), edit)
                .await
            {
                warn!("Failed to update the board in channel {channel_id}: {e}");
                warnings.push(EDIT_WARNING);
            }
        }

        let message = if placed.top_up {
            format!(
                "**Bet updated** · You added **{}** on `{}`, your stake is now **{}**.",
                economy.money(placed.added),
                capitalize(&placed.choice),
                economy.money(placed.total)
            )
        } else {
            format!(
                "**Bet placed** · You bet **{}** on `{}`.",
                economy.money(placed.added),
                capitalize(&placed.choice)
            )
        };

        let mut reply = poise::CreateReply::default()
            .content(with_warnings(&message, &warnings))
            .ephemeral(true);
        if let Some(message_id) = placed.session.message_id {
            let url = format!("https://discord.com/channels/{guild_id}/{channel_id}/{message_id}");
            reply = reply.components(vec![serenity::CreateActionRow::Buttons(vec![
                serenity::CreateButton::new_link(url).label("View the board"),
            ])]);
        }
        ctx.send(reply).await?;
        Ok(())
    }

    /// Records the board message on the session. The session stays open without a
    /// board when this fails.
    async fn link_board<C: ConnectionTrait>(
        db: &C,
        channel_id: u64,
        message_id: u64,
        warnings: &mut Vec<&'static str>,
    ) {
        if let Err(e) = gambling::attach_display_message(db, channel_id, message_id).await {
            warn!("Failed to link board {message_id} in channel {channel_id}: {e}");
            warnings.push(LINK_WARNING);
        }
    }

    async fn can_manage(ctx: Context<'_>, session: &Session) -> bool {
        if ctx.author().id.get() == session.author_id {
            return true;
        }
        ctx.author_member()
            .await
            .and_then(|member| member.permissions)
            .is_some_and(|permissions| permissions.manage_messages())
    }

    fn board_embed(
        session: &Session,
        bets: &[bet::Model],
        economy: &EconomySettings,
        result: Option<&str>,
    ) -> serenity::CreateEmbed {
        let status = if result.is_some() {
            "Betting closed"
        } else {
            "Betting open"
        };
        let footer = if session.minimal_bet > 1 {
            format!(
                "Bet with /bet · Minimum {}",
                economy.money(session.minimal_bet)
            )
        } else {
            "Bet with /bet".to_string()
        };
        serenity::CreateEmbed::default()
            .author(serenity::CreateEmbedAuthor::new(status))
            .title(&session.title)
            .description(gambling::render_board(
                session,
                bets,
                &economy.currency,
                result,
            ))
            .color(EMBED_COLOR)
            .footer(serenity::CreateEmbedFooter::new(footer))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::test_utils::setup_test_db;

        const CHANNEL: u64 = 555;

        #[tokio::test]
        async fn test_link_board_records_message() -> Result<()> {
            let db = setup_test_db().await?;
            gambling::open_session(
                &db,
                NewSession {
                    channel_id: CHANNEL,
                    title: "Final",
                    choices: "heads,tails",
                    minimal_bet: 1,
                    author_id: 1,
                },
            )
            .await?;

            let mut warnings = Vec::new();
            link_board(&db, CHANNEL, 777, &mut warnings).await;
            assert!(warnings.is_empty());
            let session = gambling::require_session(&db, CHANNEL).await?;
            assert_eq!(session.message_id, Some(777));
            Ok(())
        }

        #[tokio::test]
        async fn test_link_board_failure_is_a_warning() -> Result<()> {
            let db = setup_test_db().await?;
            let mut warnings = Vec::new();
            link_board(&db, CHANNEL, 777, &mut warnings).await;
            assert_eq!(warnings, vec![LINK_WARNING]);
            Ok(())
        }
    }
}

// Re-export all commands
pub use inner::*;
