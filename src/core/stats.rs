//! Guild-wide economy statistics and the leaderboard.

use crate::{
    core::{AccountKey, account, from_db_id, transaction},
    errors::Result,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::ConnectionTrait;

/// Number of accounts listed on the leaderboard
pub const LEADERBOARD_SIZE: usize = 20;

/// Snapshot of a guild economy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildStats {
    /// Number of open accounts
    pub accounts: usize,
    /// Money in circulation
    pub total: i64,
    /// Integer mean balance
    pub average: i64,
    /// Balance at position `len / 2` of the richest-first list
    pub median: i64,
    /// Richest user and their balance
    pub richest: (u64, i64),
    /// Net change of all balances over the last 24 hours
    pub variation_24h: i64,
}

/// Computes the guild statistics at `now`. Returns `None` when no account exists.
pub async fn guild_stats<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<Option<GuildStats>> {
    let accounts = account::accounts_by_balance(db).await?;
    let Some(richest) = accounts.first() else {
        return Ok(None);
    };

    let total: i64 = accounts.iter().map(|a| a.balance).sum();
    let count = i64::try_from(accounts.len()).unwrap_or(i64::MAX);
    let variation_24h = transaction::since(db, now - Duration::hours(24))
        .await?
        .iter()
        .map(|t| t.amount)
        .sum();

    Ok(Some(GuildStats {
        accounts: accounts.len(),
        total,
        average: total.div_euclid(count),
        median: accounts[accounts.len() / 2].balance,
        richest: (from_db_id(richest.user_id), richest.balance),
        variation_24h,
    }))
}

/// One leaderboard line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    /// 1-based rank
    pub rank: usize,
    /// Account owner
    pub user_id: u64,
    /// Balance
    pub balance: i64,
}

/// Top accounts of a guild as seen by one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    /// Richest accounts, at most [`LEADERBOARD_SIZE`]
    pub top: Vec<Standing>,
    /// Rank of the viewer when they are not listed in `top`
    pub viewer_rank: Option<usize>,
    /// Money in circulation
    pub total: i64,
}

/// Builds the leaderboard shown to `viewer`.
///
/// The viewer's account is opened first so it counts in the ranking and the total.
pub async fn leaderboard<C: ConnectionTrait>(db: &C, viewer: AccountKey) -> Result<Leaderboard> {
    account::get_or_create(db, viewer).await?;
    let accounts = account::accounts_by_balance(db).await?;
    let total = accounts.iter().map(|a| a.balance).sum();

    let top: Vec<Standing> = accounts
        .iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, a)| Standing {
            rank: i + 1,
            user_id: from_db_id(a.user_id),
            balance: a.balance,
        })
        .collect();

    let viewer_rank = if top.iter().any(|s| s.user_id == viewer.user_id) {
        None
    } else {
        accounts
            .iter()
            .position(|a| a.user_id == viewer.db_user_id())
            .map(|i| i + 1)
    };

    Ok(Leaderboard {
        top,
        viewer_rank,
        total,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_empty_guild_has_no_stats() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(guild_stats(&db, test_start()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_guild_stats() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        ledger.set(&db, key(1), 10, "").await?; // -90
        ledger.set(&db, key(2), 400, "").await?; // +300
        ledger.set(&db, key(3), 90, "").await?; // -10
        clock.advance(Duration::hours(25));
        ledger.deposit(&db, key(3), 5, "").await?;

        let stats = guild_stats(&db, clock.now()).await?.unwrap();
        assert_eq!(stats.accounts, 3);
        assert_eq!(stats.total, 505);
        assert_eq!(stats.average, 168);
        // Sorted richest first: 400, 95, 10
        assert_eq!(stats.median, 95);
        assert_eq!(stats.richest, (2, 400));
        assert_eq!(stats.variation_24h, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_leaderboard_viewer_outside_top() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        for user in 1..=25 {
            let user_id = u64::try_from(user).unwrap();
            ledger.set(&db, key(user_id), 1000 - user, "").await?;
        }

        let board = leaderboard(&db, key(1)).await?;
        assert_eq!(board.top.len(), LEADERBOARD_SIZE);
        assert_eq!(board.top[0].user_id, 1);
        assert_eq!(board.top[0].rank, 1);
        assert!(board.viewer_rank.is_none());

        let board = leaderboard(&db, key(25)).await?;
        assert_eq!(board.viewer_rank, Some(25));

        // Unknown viewer gets a default account, ranked last
        let before = leaderboard(&db, key(25)).await?.total;
        let board = leaderboard(&db, key(99)).await?;
        assert_eq!(board.viewer_rank, Some(26));
        assert_eq!(board.total, before + 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_first_leaderboard_counts_viewer_in_total() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        ledger.set(&db, key(1), 500, "").await?;

        let board = leaderboard(&db, key(2)).await?;
        assert_eq!(board.total, 600);
        assert_eq!(board.top.len(), 2);
        assert!(board.viewer_rank.is_none());
        Ok(())
    }
}
