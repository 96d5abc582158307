//! Bank administration commands - `/configbank` and its subcommands.
//!
//! Restricted to members with the Manage Server permission. Destructive operations on
//! ledger rows ask for confirmation first.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData, ensure_account_holder, guild_database,
            handlers::{
                autocomplete,
                confirm::{PromptLabels, confirm},
            },
            reply_ephemeral,
        },
        core::{
            AccountKey, account,
            format::signed,
            report::relative_date,
            settings::{self, Setting},
            transaction,
        },
        entities,
        errors::{Error, Result},
    };
    use chrono::{DateTime, Utc};
    use poise::serenity_prelude as serenity;
    use sea_orm::TransactionTrait;
    use tracing::info;

    /// Server bank settings and moderation.
    #[poise::command(
        slash_command,
        guild_only,
        default_member_permissions = "MANAGE_GUILD",
        subcommands(
            "configbank_reset",
            "configbank_setbalance",
            "configbank_cancel",
            "configbank_reason",
            "configbank_delete",
            "configbank_currency",
            "configbank_daily",
            "configbank_defaultbalance"
        )
    )]
    pub async fn configbank(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Bank administration. Available subcommands:\n\
            `/configbank reset <user>` - Reset a balance to the default\n\
            `/configbank setbalance <user> <amount>` - Set a balance\n\
            `/configbank cancel <transaction_id>` - Revert a transaction\n\
            `/configbank reason <transaction_id> <reason>` - Edit a transaction reason\n\
            `/configbank delete <transaction_id>` - Delete a transaction from the history\n\
            `/configbank currency <symbol>` - Change the currency symbol\n\
            `/configbank daily <amount> <limit>` - Configure the daily stipend (0 disables it)\n\
            `/configbank defaultbalance <amount>` - Balance of new accounts";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Resets the balance of a member to the server default.
    #[poise::command(slash_command, guild_only, rename = "reset")]
    pub async fn configbank_reset(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member whose balance to reset"] user: serenity::User,
    ) -> Result<()> {
        ensure_account_holder(&user)?;
        let (guild_id, db) = guild_database(ctx).await?;
        let key = AccountKey::new(guild_id, user.id.get());

        ctx.data().ledger.reset(&db, key).await?;
        let economy = settings::load(&db).await?;
        info!("{} reset the account {key}", ctx.author().name);
        ctx.say(format!(
            "**Balance reset** · The balance of <@{}> is back to **{}**",
            user.id,
            economy.money(economy.default_balance)
        ))
        .await?;
        Ok(())
    }

    /// Sets the balance of a member.
    #[poise::command(slash_command, guild_only, rename = "setbalance")]
    pub async fn configbank_setbalance(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member whose balance to set"] user: serenity::User,
        #[description = "New balance"]
        #[min = 0]
        amount: i64,
    ) -> Result<()> {
        ensure_account_holder(&user)?;
        let (guild_id, db) = guild_database(ctx).await?;
        let key = AccountKey::new(guild_id, user.id.get());
        let reason = format!("Balance set by {}", ctx.author().display_name());

        ctx.data().ledger.set(&db, key, amount, &reason).await?;
        let economy = settings::load(&db).await?;
        ctx.say(format!(
            "**Balance updated** · The balance of <@{}> is now **{}**",
            user.id,
            economy.money(amount)
        ))
        .await?;
        Ok(())
    }

    /// Reverts a transaction by recording its opposite.
    #[poise::command(slash_command, guild_only, rename = "cancel")]
    pub async fn configbank_cancel(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Identifier of the transaction"]
        #[autocomplete = "autocomplete::autocomplete_transaction_id"]
        transaction_id: String,
    ) -> Result<()> {
        let (guild_id, db) = guild_database(ctx).await?;
        let entry = transaction::get_existing(&db, &transaction_id).await?;
        let now = ctx.data().ledger.now();

        let answer = confirm(
            ctx,
            format!(
                "Revert this transaction?\n{}",
                describe_transaction(&entry, now)
            ),
            PromptLabels::default(),
        )
        .await?;
        if !answer.is_confirmed() {
            return reply_ephemeral(ctx, answer.abort_message("The transaction was not reverted."))
                .await;
        }

        let owner = AccountKey::new(guild_id, transaction::owner(&entry));
        let reversal = ctx
            .data()
            .ledger
            .cancel(&db, owner, &transaction_id)
            .await?;
        let economy = settings::load(&db).await?;
        let balance = account::balance(&db, owner).await?;
        ctx.say(format!(
            "**Transaction reverted** · `{transaction_id}` was reverted by `{}` ({}), the balance of <@{}> is now **{}**",
            reversal.id,
            signed(reversal.amount),
            owner.user_id,
            economy.money(balance)
        ))
        .await?;
        Ok(())
    }

    /// Changes the reason of a transaction.
    #[poise::command(slash_command, guild_only, rename = "reason")]
    pub async fn configbank_reason(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Identifier of the transaction"]
        #[autocomplete = "autocomplete::autocomplete_transaction_id"]
        transaction_id: String,
        #[description = "New reason"] reason: String,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let updated = transaction::update_reason(&db, &transaction_id, reason.trim()).await?;
        ctx.say(format!(
            "**Reason updated** · {}",
            describe_transaction(&updated, ctx.data().ledger.now())
        ))
        .await?;
        Ok(())
    }

    /// Deletes a transaction from the history without touching the balance.
    #[poise::command(slash_command, guild_only, rename = "delete")]
    pub async fn configbank_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Identifier of the transaction"]
        #[autocomplete = "autocomplete::autocomplete_transaction_id"]
        transaction_id: String,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let entry = transaction::get_existing(&db, &transaction_id).await?;

        let answer = confirm(
            ctx,
            format!(
                "Delete this transaction? The balance will not change.\n{}",
                describe_transaction(&entry, ctx.data().ledger.now())
            ),
            PromptLabels {
                confirm: "Delete",
                cancel: "Keep",
            },
        )
        .await?;
        if !answer.is_confirmed() {
            return reply_ephemeral(ctx, answer.abort_message("The transaction was kept.")).await;
        }

        transaction::delete(&db, &transaction_id).await?;
        ctx.say(format!(
            "**Transaction deleted** · `{transaction_id}` was removed from the history"
        ))
        .await?;
        Ok(())
    }

    /// Changes the currency symbol of the server.
    #[poise::command(slash_command, guild_only, rename = "currency")]
    pub async fn configbank_currency(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Currency symbol (up to 3 characters)"] symbol: String,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        settings::update(&db, Setting::Currency(symbol.clone())).await?;
        ctx.say(format!(
            "**Setting updated** · The currency symbol is now `{symbol}`"
        ))
        .await?;
        Ok(())
    }

    /// Configures the daily stipend (0 disables it).
    #[poise::command(slash_command, guild_only, rename = "daily")]
    pub async fn configbank_daily(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Full stipend amount"]
        #[min = 0]
        amount: i64,
        #[description = "Balance from which no stipend is paid"]
        #[min = 0]
        limit: i64,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let txn = db.begin().await?;
        settings::update(&txn, Setting::DailyAmount(amount)).await?;
        settings::update(&txn, Setting::DailyLimit(limit)).await?;
        txn.commit().await?;

        let economy = settings::load(&db).await?;
        let message = if economy.daily_enabled() {
            format!(
                "**Settings updated** · The daily stipend is now `{}` with a balance limit of `{}`",
                economy.money(amount),
                economy.money(limit)
            )
        } else {
            "**Settings updated** · The daily stipend is disabled".to_string()
        };
        ctx.say(message).await?;
        Ok(())
    }

    /// Changes the balance new accounts start with.
    #[poise::command(slash_command, guild_only, rename = "defaultbalance")]
    pub async fn configbank_defaultbalance(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Default balance"]
        #[min = 0]
        amount: i64,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        settings::update(&db, Setting::DefaultBalance(amount)).await?;
        let economy = settings::load(&db).await?;
        ctx.say(format!(
            "**Setting updated** · New accounts now start with `{}`",
            economy.money(amount)
        ))
        .await?;
        Ok(())
    }

    fn describe_transaction(entry: &entities::transaction::Model, now: DateTime<Utc>) -> String {
        let mut line = format!(
            "`{}` · <@{}> · **{}** · {}",
            entry.id,
            transaction::owner(entry),
            signed(entry.amount),
            relative_date(entry.timestamp, now)
        );
        if !entry.reason.is_empty() {
            line.push_str(" · ");
            line.push_str(&entry.reason);
        }
        line
    }
}

// Re-export all commands
pub use inner::*;
