//! General Discord commands - ping and help.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Analog Help**\n\
        Here is a summary of all available commands.\n\n\
        **Economy**\n\
        • `/bank account [user]` - Shows a bank account.\n\
        • `/bank history [user]` - Browses the transaction history.\n\
        • `/bank give <user> <amount> [reason]` - Sends money to another member.\n\
        • `/daily` - Claims your daily stipend.\n\
        • `/leaderboard` - Shows the richest members.\n\
        • `/stats` - Shows statistics about the server economy.\n\n\
        **Gambling**\n\
        • `/gamble start <title> <choices> [minimal_bet]` - Opens a betting session in this channel.\n\
        • `/gamble stop <result>` - Closes the session and pays the winners.\n\
        • `/gamble cancel` - Cancels the session and refunds every bet.\n\
        • `/gamble list` - Lists the sessions running on this server.\n\
        • `/bet <choice> <amount>` - Bets on a choice of the running session.\n\n\
        **Game tools**\n\
        • `/flip` - Flips a coin.\n\
        • `/roll <dice>` - Rolls dice, e.g. `2d6+1d(1,5,10)`.\n\
        • `/throws <save|roll|list|delete>` - Manages saved throws.\n\n\
        **Administration** (Manage Server)\n\
        • `/configbank <subcommand>` - Balances, transactions and bank settings.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
