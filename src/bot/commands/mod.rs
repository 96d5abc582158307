//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Bank administration commands
pub mod bank_admin;

/// Economy commands
pub mod economy;

/// Betting session commands
pub mod gambling;

/// Coin, dice and saved throw commands
pub mod gametools;

/// General utility commands
pub mod general;

use crate::{bot::BotData, errors::Error};

// Export commands
pub use bank_admin::*;
pub use economy::*;
pub use gambling::*;
pub use gametools::*;
pub use general::*;

/// Every command registered with the framework.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        // Economy
        bank(),
        bank_account_menu(),
        daily(),
        leaderboard(),
        stats(),
        configbank(),
        // Gambling
        gamble(),
        bet(),
        // Game tools
        flip(),
        roll(),
        throws(),
        // General
        ping(),
        help(),
    ]
}
