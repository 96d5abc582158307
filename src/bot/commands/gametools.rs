//! Game tools Discord commands - coin flips, dice rolls and saved throws.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, EMBED_COLOR, guild_database, handlers::autocomplete, reply_ephemeral},
        core::{
            dice::{self, DiceThrow},
            format::{codeblock, table},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    /// Longest accepted name for a saved throw
    const MAX_THROW_NAME_LEN: usize = 32;

    /// Flips a coin.
    #[poise::command(slash_command)]
    pub async fn flip(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let side = dice::flip(&mut rand::thread_rng());
        ctx.say(format!("`🪙` **{side}**!")).await?;
        Ok(())
    }

    /// Rolls dice, e.g. `2d6+1d(1,5,10)`.
    #[poise::command(slash_command)]
    pub async fn roll(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Dice to roll (NdF or Nd(F1,F2,...) separated by '+')"] dice: String,
    ) -> Result<()> {
        let throw: DiceThrow = dice.parse()?;
        let embed = roll_embed(&throw);
        ctx.data().remember_throw(ctx.author().id.get(), throw).await;
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Save and reuse dice throws.
    #[poise::command(
        slash_command,
        guild_only,
        subcommands("throws_save", "throws_roll", "throws_list", "throws_delete")
    )]
    pub async fn throws(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Saved throws. Available subcommands:\n\
            `/throws save <name>` - Save your last `/roll` under a name\n\
            `/throws roll <name>` - Roll a saved throw\n\
            `/throws list` - List the throws saved on this server\n\
            `/throws delete <name>` - Delete a saved throw";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Saves your last throw under a name.
    #[poise::command(slash_command, guild_only, rename = "save")]
    pub async fn throws_save(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name of the throw"] name: String,
    ) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_THROW_NAME_LEN {
            return reply_ephemeral(
                ctx,
                format!("❌ The name must contain 1 to {MAX_THROW_NAME_LEN} characters."),
            )
            .await;
        }
        let Some(throw) = ctx.data().last_throw(ctx.author().id.get()).await else {
            return reply_ephemeral(ctx, "❌ Roll some dice with `/roll` first.").await;
        };

        let (_, db) = guild_database(ctx).await?;
        dice::save_throw(&db, name, &throw).await?;
        ctx.say(format!(
            "**Throw saved** · `{throw}` is now available as `{}`",
            name.to_lowercase()
        ))
        .await?;
        Ok(())
    }

    /// Rolls a saved throw.
    #[poise::command(slash_command, guild_only, rename = "roll")]
    pub async fn throws_roll(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name of the throw"]
        #[autocomplete = "autocomplete::autocomplete_throw_name"]
        name: String,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let throw = dice::load_throw(&db, &name).await?;
        let embed = roll_embed(&throw);
        ctx.data().remember_throw(ctx.author().id.get(), throw).await;
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Lists the throws saved on this server.
    #[poise::command(slash_command, guild_only, rename = "list")]
    pub async fn throws_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        let saved = dice::list_throws(&db).await?;
        if saved.is_empty() {
            return reply_ephemeral(ctx, "No throw is saved on this server.").await;
        }

        let rows: Vec<Vec<String>> = saved
            .iter()
            .map(|(name, throw)| vec![name.clone(), throw.to_string()])
            .collect();
        let embed = serenity::CreateEmbed::default()
            .title("Saved throws")
            .description(codeblock(&table(None, &rows), ""))
            .color(EMBED_COLOR);
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Deletes a saved throw.
    #[poise::command(slash_command, guild_only, rename = "delete")]
    pub async fn throws_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name of the throw"]
        #[autocomplete = "autocomplete::autocomplete_throw_name"]
        name: String,
    ) -> Result<()> {
        let (_, db) = guild_database(ctx).await?;
        dice::delete_throw(&db, &name).await?;
        ctx.say(format!("**Throw deleted** · `{}`", name.trim().to_lowercase()))
            .await?;
        Ok(())
    }

    fn roll_embed(throw: &DiceThrow) -> serenity::CreateEmbed {
        let rolls = throw.roll_all(&mut rand::thread_rng());
        let total: u64 = rolls.iter().copied().map(u64::from).sum();
        let rows: Vec<Vec<String>> = throw
            .dice()
            .iter()
            .zip(&rolls)
            .map(|(die, rolled)| vec![die.to_string(), rolled.to_string()])
            .collect();

        serenity::CreateEmbed::default()
            .description(format!(
                "# `🎲 {throw}`\n{}",
                codeblock(&table(None, &rows), "")
            ))
            .color(EMBED_COLOR)
            .footer(serenity::CreateEmbedFooter::new(format!("Total · {total}")))
    }
}

// Re-export all commands
pub use inner::*;
