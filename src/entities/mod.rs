//! Entity module - Contains all SeaORM entity definitions for a guild store.
//! Every guild gets its own database holding these tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod bet;
pub mod betting;
pub mod condition;
pub mod guild_config;
pub mod saved_throw;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use bet::{Column as BetColumn, Entity as Bet, Model as BetModel};
pub use betting::{Column as BettingColumn, Entity as Betting, Model as BettingModel};
pub use condition::{Column as ConditionColumn, Entity as Condition, Model as ConditionModel};
pub use guild_config::{
    Column as GuildConfigColumn, Entity as GuildConfig, Model as GuildConfigModel,
};
pub use saved_throw::{Column as SavedThrowColumn, Entity as SavedThrow, Model as SavedThrowModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
