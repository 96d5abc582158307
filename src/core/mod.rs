//! Core business logic - framework-agnostic economy, gambling and dice operations.
//!
//! Everything in here works on a guild store connection (or a transaction on it) and
//! knows nothing about Discord. The bot layer maps commands onto these functions.

pub mod account;
pub mod condition;
pub mod daily;
pub mod dice;
pub mod format;
pub mod gambling;
pub mod ledger;
pub mod report;
pub mod settings;
pub mod stats;
pub mod transaction;

/// Canonical identity of an account: the guild store it lives in plus its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountKey {
    /// Discord guild ID
    pub guild_id: u64,
    /// Discord user ID
    pub user_id: u64,
}

impl AccountKey {
    /// Creates a key for `user_id` in `guild_id`.
    #[must_use]
    pub const fn new(guild_id: u64, user_id: u64) -> Self {
        Self { guild_id, user_id }
    }

    /// Owner ID in its storage representation.
    #[must_use]
    pub const fn db_user_id(self) -> i64 {
        to_db_id(self.user_id)
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user_id, self.guild_id)
    }
}

/// Discord snowflakes are stored bit-for-bit in signed `SQLite` integers.
#[allow(clippy::cast_possible_wrap)]
#[must_use]
pub const fn to_db_id(id: u64) -> i64 {
    id as i64
}

/// Inverse of [`to_db_id`].
#[allow(clippy::cast_sign_loss)]
#[must_use]
pub const fn from_db_id(id: i64) -> u64 {
    id as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_id_round_trips_large_snowflakes() {
        let id = u64::MAX - 5;
        assert!(to_db_id(id) < 0);
        assert_eq!(from_db_id(to_db_id(id)), id);
    }

    #[test]
    fn test_account_key_equality_is_structural() {
        let a = AccountKey::new(1, 2);
        let b = AccountKey { guild_id: 1, user_id: 2 };
        assert_eq!(a, b);
        assert_ne!(a, AccountKey::new(2, 2));
        assert_eq!(a.to_string(), "2@1");
    }
}
