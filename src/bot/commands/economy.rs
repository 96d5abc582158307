//! Economy Discord commands - bank accounts, transfers, daily stipend, rankings.
//!
//! These commands read and mutate member balances through the core ledger and render
//! the results as embeds.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData, Context, EMBED_COLOR, ensure_account_holder, guild_database,
            handlers::pagination::{HistoryView, show_history},
            reply_ephemeral,
        },
        core::{
            AccountKey, account, daily,
            format::{codeblock, signed},
            report, settings, stats,
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use sea_orm::DatabaseConnection;

    /// Manage your bank account.
    #[poise::command(
        slash_command,
        guild_only,
        subcommands("bank_account", "bank_history", "bank_give")
    )]
    pub async fn bank(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Bank commands. Available subcommands:\n\
            `/bank account [user]` - Show a bank account\n\
            `/bank history [user]` - Browse the transaction history\n\
            `/bank give <user> <amount> [reason]` - Send money to another member";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Shows your bank account or the account of another member.
    #[poise::command(slash_command, guild_only, rename = "account")]
    pub async fn bank_account(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member whose account to show"] user: Option<serenity::User>,
    ) -> Result<()> {
        let user = user.as_ref().unwrap_or_else(|| ctx.author());
        ensure_account_holder(user)?;

        let (guild_id, db) = guild_database(ctx).await?;
        let key = AccountKey::new(guild_id, user.id.get());
        let embed = account_embed(ctx, &db, key, user).await?;
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows the bank account of a member, only to you.
    #[poise::command(context_menu_command = "Bank account", guild_only)]
    pub async fn bank_account_menu(
        ctx: poise::Context<'_, BotData, Error>,
        user: serenity::User,
    ) -> Result<()> {
        ensure_account_holder(&user)?;

        let (guild_id, db) = guild_database(ctx).await?;
        let key = AccountKey::new(guild_id, user.id.get());
        let embed = account_embed(ctx, &db, key, &user).await?;
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Browses your transaction history or the history of another member.
    #[poise::command(slash_command, guild_only, rename = "history")]
    pub async fn bank_history(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member whose history to show"] user: Option<serenity::User>,
    ) -> Result<()> {
        let user = user.as_ref().unwrap_or_else(|| ctx.author());
        ensure_account_holder(user)?;

        let (guild_id, db) = guild_database(ctx).await?;
        let key = AccountKey::new(guild_id, user.id.get());
        let entries = account::transactions(&db, key, None).await?;
        let view = HistoryView::new(
            format!("History of {}", user.display_name()),
            &entries,
            ctx.data().ledger.now(),
        );
        show_history(ctx, view).await
    }

    /// Gives money to another member.
    #[poise::command(slash_command, guild_only, rename = "give")]
    pub async fn bank_give(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member receiving the money"] user: serenity::User,
        #[description = "Amount to give"]
        #[min = 1]
        amount: i64,
        #[description = "Optional reason shown in both histories"] reason: Option<String>,
    ) -> Result<()> {
        ensure_account_holder(&user)?;

        let (guild_id, db) = guild_database(ctx).await?;
        let giver = AccountKey::new(guild_id, ctx.author().id.get());
        let receiver = AccountKey::new(guild_id, user.id.get());

        let mut ledger_reason = format!(
            "Gift from {} to {}",
            ctx.author().display_name(),
            user.display_name()
        );
        if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
            ledger_reason = format!("{ledger_reason} > {}", reason.trim());
        }

        let (_, credit) = ctx
            .data()
            .ledger
            .transfer(&db, giver, receiver, amount, &ledger_reason)
            .await?;

        let economy = settings::load(&db).await?;
        let mut message = format!(
            "**Transfer done** · **{}** sent to <@{}>",
            economy.money(credit.amount),
            user.id
        );
        if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
            message.push_str(&format!(": `{}`", reason.trim()));
        }
        ctx.say(message).await?;
        Ok(())
    }

    /// Claims your daily stipend.
    #[poise::command(slash_command, guild_only)]
    pub async fn daily(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (guild_id, db) = guild_database(ctx).await?;
        let key = AccountKey::new(guild_id, ctx.author().id.get());

        let claim = daily::claim_daily(&ctx.data().ledger, &db, key).await?;
        let economy = settings::load(&db).await?;
        ctx.say(format!(
            "**Daily stipend claimed** · **{}** added to your account, your balance is now **{}**",
            economy.money(claim.amount),
            economy.money(claim.balance)
        ))
        .await?;
        Ok(())
    }

    /// Shows the richest members of the server.
    #[poise::command(slash_command, guild_only)]
    pub async fn leaderboard(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (guild_id, db) = guild_database(ctx).await?;
        if account::accounts_by_balance(&db).await?.is_empty() {
            return reply_ephemeral(ctx, "❌ No bank account has been opened on this server yet.")
                .await;
        }

        let viewer = AccountKey::new(guild_id, ctx.author().id.get());
        let board = stats::leaderboard(&db, viewer).await?;
        let economy = settings::load(&db).await?;

        let mut embed = serenity::CreateEmbed::default()
            .title(format!("Leaderboard · {}", guild_name(ctx)))
            .description(report::leaderboard_text(&board, &economy))
            .color(EMBED_COLOR)
            .footer(serenity::CreateEmbedFooter::new(format!(
                "Total on the server · {}",
                economy.money(board.total)
            )));
        if let Some(rank) = board.viewer_rank {
            embed = embed.field("Your rank", codeblock(&format!("#{rank}"), ""), false);
        }

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows statistics about the server economy.
    #[poise::command(slash_command, guild_only)]
    pub async fn stats(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let Some(snapshot) = stats::guild_stats(&db, ctx.data().ledger.now()).await? else {
            return reply_ephemeral(ctx, "❌ No bank account has been opened on this server yet.")
                .await;
        };
        let economy = settings::load(&db).await?;
        let (richest_id, richest_balance) = snapshot.richest;

        let embed = serenity::CreateEmbed::default()
            .title(format!("Economy statistics · {}", guild_name(ctx)))
            .color(EMBED_COLOR)
            .field(
                "Richest",
                format!("<@{richest_id}> · **{}**", economy.money(richest_balance)),
                false,
            )
            .field("Average", codeblock(&economy.money(snapshot.average), ""), true)
            .field("Median", codeblock(&economy.money(snapshot.median), ""), true)
            .field(
                "Last 24h",
                codeblock(&signed(snapshot.variation_24h), "diff"),
                true,
            )
            .field(
                "In circulation",
                codeblock(&economy.money(snapshot.total), ""),
                true,
            )
            .footer(serenity::CreateEmbedFooter::new(format!(
                "{} account{}",
                snapshot.accounts,
                if snapshot.accounts == 1 { "" } else { "s" }
            )));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    async fn account_embed(
        ctx: Context<'_>,
        db: &DatabaseConnection,
        key: AccountKey,
        user: &serenity::User,
    ) -> Result<serenity::CreateEmbed> {
        let economy = settings::load(db).await?;
        let summary = report::account_summary(db, key, ctx.data().ledger.now()).await?;

        let mut embed = serenity::CreateEmbed::default()
            .author(serenity::CreateEmbedAuthor::new(user.display_name()).icon_url(user.face()))
            .title("Bank account")
            .color(EMBED_COLOR)
            .field("Balance", codeblock(&economy.money(summary.balance), ""), true)
            .field(
                "Last 24h",
                codeblock(&signed(summary.variation_24h), "diff"),
                true,
            )
            .field("Rank", codeblock(&format!("#{}", summary.rank), ""), true);
        if let Some(recent) = report::recent_block(&summary.recent) {
            embed = embed.field("Latest transactions", recent, false);
        }
        Ok(embed)
    }

    fn guild_name(ctx: Context<'_>) -> String {
        ctx.guild()
            .map_or_else(|| "this server".to_string(), |guild| guild.name.clone())
    }
}

// Re-export all commands
pub use inner::*;
