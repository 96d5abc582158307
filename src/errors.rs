//! Unified error type for the economy, gambling and game tools modules.
//!
//! Validation failures carry structured fields so the bot layer can show them to the
//! invoking user as-is, while storage and framework failures are logged and hidden
//! behind a generic message. See [`Error::is_user_facing`].

use poise::serenity_prelude as serenity;
use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying `SeaORM` / `SQLite` failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// I/O failure (guild store directory, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Condition payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Formatting into a message buffer failed
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Serenity/Poise framework failure
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<serenity::Error>),

    /// Command used outside of a guild
    #[error("This command can only be used in a server.")]
    GuildOnly,

    /// Negative or otherwise unusable amount
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// The account cannot cover the requested debit
    #[error("Insufficient funds: balance is {current}, {required} required")]
    InsufficientFunds {
        /// Balance observed when the debit was attempted
        current: i64,
        /// Amount the operation needed
        required: i64,
    },

    /// The balance changed between read and write
    #[error("The balance of user {user_id} changed concurrently, try again")]
    ConcurrentUpdate {
        /// Owner of the contested account
        user_id: u64,
    },

    /// Giver and receiver are the same account
    #[error("You cannot transfer money to yourself")]
    SelfTransfer,

    /// Bot users cannot hold an account
    #[error("Bots do not have a bank account")]
    BotAccount,

    /// No ledger entry with this identifier
    #[error("Transaction `{id}` does not exist")]
    TransactionNotFound {
        /// Requested identifier
        id: String,
    },

    /// The ledger entry belongs to another account
    #[error("Transaction `{id}` does not belong to this account")]
    TransactionNotOwned {
        /// Identifier of the foreign entry
        id: String,
    },

    /// Same user, same absolute amount, same second as an existing entry
    #[error("Transaction `{id}` already exists, retry in a second")]
    TransactionIdCollision {
        /// Colliding identifier
        id: String,
    },

    /// Currency symbol rejected
    #[error("Invalid currency symbol: {reason}")]
    InvalidCurrency {
        /// Why the symbol was rejected
        reason: String,
    },

    /// The daily stipend is switched off in this guild
    #[error("The daily stipend is not available on this server")]
    DailyDisabled,

    /// Already claimed on this calendar date
    #[error("You already claimed your daily stipend today, try again tomorrow")]
    DailyAlreadyClaimed,

    /// Balance at or above the stipend cap
    #[error("You reached the balance limit for the daily stipend ({cap})")]
    DailyCapReached {
        /// Configured cap
        cap: i64,
    },

    /// The decayed stipend rounds to nothing
    #[error("Your balance is too high: the remaining stipend is less than one credit")]
    DailyAmountTooSmall,

    /// A betting session already runs in the channel
    #[error("A betting session is already running in this channel")]
    SessionAlreadyOpen {
        /// Channel of the running session
        channel_id: u64,
    },

    /// No betting session in the channel
    #[error("No betting session is running in this channel")]
    NoOpenSession {
        /// Channel that was queried
        channel_id: u64,
    },

    /// Session title is too long
    #[error("The title cannot exceed {max} characters")]
    TitleTooLong {
        /// Maximum accepted length
        max: usize,
    },

    /// Wrong number of choices for a session
    #[error("A betting session needs between 2 and 4 distinct choices, got {count}")]
    InvalidChoiceCount {
        /// Number of distinct choices supplied
        count: usize,
    },

    /// Choice not declared by the session
    #[error("The choice `{choice}` does not exist")]
    InvalidChoice {
        /// Rejected choice
        choice: String,
    },

    /// Stake below the session minimum
    #[error("The minimum stake is {minimum}, you offered {amount}")]
    StakeBelowMinimum {
        /// Offered stake
        amount: i64,
        /// Session minimum
        minimum: i64,
    },

    /// The user already bet on another choice
    #[error("You already bet on `{current}` and cannot switch")]
    ChoiceLocked {
        /// Choice the user is locked into
        current: String,
    },

    /// Dice expression term matches no grammar
    #[error("Invalid dice `{term}`: use NdF or Nd(F1,F2,...) separated by '+'")]
    InvalidThrow {
        /// Offending term
        term: String,
    },

    /// Too many dice in one throw
    #[error("You cannot throw more than {max} dice at once ({count} requested)")]
    TooManyDice {
        /// Dice requested so far
        count: usize,
        /// Maximum accepted
        max: usize,
    },

    /// No saved throw under this name
    #[error("No saved throw named `{name}`")]
    ThrowNotFound {
        /// Requested name
        name: String,
    },
}

impl Error {
    /// Whether the error is a rejection the invoking user should read verbatim,
    /// as opposed to an internal failure.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Config { .. }
                | Self::Io(_)
                | Self::EnvVar(_)
                | Self::Serialization(_)
                | Self::Format(_)
                | Self::FrameworkError(_)
        )
    }
}

impl From<serenity::Error> for Error {
    fn from(value: serenity::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_user_facing() {
        assert!(Error::SelfTransfer.is_user_facing());
        assert!(Error::InvalidAmount { amount: -3 }.is_user_facing());
        assert!(
            Error::NoOpenSession { channel_id: 1 }.is_user_facing(),
            "session errors are shown to the user"
        );
    }

    #[test]
    fn test_internal_errors_are_hidden() {
        let db = Error::from(sea_orm::DbErr::Custom("boom".to_string()));
        assert!(!db.is_user_facing());
        assert!(
            !Error::Config {
                message: "bad".to_string()
            }
            .is_user_facing()
        );
    }
}
