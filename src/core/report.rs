//! Report generation business logic.
//!
//! This module builds account summaries, transaction history pages and leaderboard
//! text. All functions are framework-agnostic and return structured data or plain
//! markdown that the bot layer drops into embeds.

use crate::{
    core::{
        AccountKey, account,
        format::{codeblock, signed, table, truncate},
        settings::EconomySettings,
        stats::Leaderboard,
        transaction::DEFAULT_HISTORY_LIMIT,
    },
    entities::transaction,
    errors::Result,
};
use chrono::{DateTime, Datelike, Duration, Local, Utc};
use sea_orm::ConnectionTrait;

/// Rows per history page
pub const HISTORY_PAGE_SIZE: usize = 20;
/// Characters of a reason shown before truncation
pub const REASON_PREVIEW_LEN: usize = 50;

/// Everything shown on an account card.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    /// Current balance
    pub balance: i64,
    /// Net change over the last 24 hours
    pub variation_24h: i64,
    /// 1-based rank in the guild
    pub rank: usize,
    /// Latest transactions, newest first
    pub recent: Vec<transaction::Model>,
}

/// Gathers the account card data of `key` at `now`.
pub async fn account_summary<C: ConnectionTrait>(
    db: &C,
    key: AccountKey,
    now: DateTime<Utc>,
) -> Result<AccountSummary> {
    let balance = account::balance(db, key).await?;
    Ok(AccountSummary {
        balance,
        variation_24h: account::balance_variation(db, key, now - Duration::hours(24)).await?,
        rank: account::rank(db, key).await?,
        recent: account::transactions(db, key, Some(DEFAULT_HISTORY_LIMIT)).await?,
    })
}

/// Which column the history view shows next to date and amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryColumn {
    /// Free-text reasons (truncated)
    #[default]
    Reason,
    /// Transaction identifiers
    Id,
}

impl HistoryColumn {
    /// The other column.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Reason => Self::Id,
            Self::Id => Self::Reason,
        }
    }

    /// Table header of the column.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Reason => "Reason",
            Self::Id => "ID",
        }
    }

    fn cell(self, entry: &transaction::Model) -> String {
        match self {
            Self::Reason => truncate(&entry.reason, REASON_PREVIEW_LEN),
            Self::Id => entry.id.clone(),
        }
    }
}

/// Short date relative to `now` in local time: `HH:MM` today, `DD/MM` this year,
/// `DD/MM/YYYY HH:MM` otherwise.
#[must_use]
pub fn relative_date(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let at = timestamp.with_timezone(&Local);
    let today = now.with_timezone(&Local);
    if at.date_naive() == today.date_naive() {
        at.format("%H:%M").to_string()
    } else if at.year() == today.year() {
        at.format("%d/%m").to_string()
    } else {
        at.format("%d/%m/%Y %H:%M").to_string()
    }
}

/// One-line rendering of a transaction, e.g. `-25 · Bet on Match`.
#[must_use]
pub fn transaction_line(entry: &transaction::Model) -> String {
    if entry.reason.is_empty() {
        signed(entry.amount)
    } else {
        format!(
            "{} · {}",
            signed(entry.amount),
            truncate(&entry.reason, REASON_PREVIEW_LEN)
        )
    }
}

/// Latest transactions as a `diff` code block, or `None` when there are none.
#[must_use]
pub fn recent_block(entries: &[transaction::Model]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let lines: Vec<String> = entries.iter().map(transaction_line).collect();
    Some(codeblock(&lines.join("\n"), "diff"))
}

/// Splits a history into code-block pages of [`HISTORY_PAGE_SIZE`] rows.
#[must_use]
pub fn history_pages(
    entries: &[transaction::Model],
    column: HistoryColumn,
    now: DateTime<Utc>,
) -> Vec<String> {
    entries
        .chunks(HISTORY_PAGE_SIZE)
        .map(|chunk| {
            let rows: Vec<Vec<String>> = chunk
                .iter()
                .map(|entry| {
                    vec![
                        relative_date(entry.timestamp, now),
                        signed(entry.amount),
                        column.cell(entry),
                    ]
                })
                .collect();
            let headers = ["Date", "Amount", column.header()];
            codeblock(&table(Some(&headers), &rows), "")
        })
        .collect()
}

/// Leaderboard body: one `rank. @user · balance` line per listed account.
#[must_use]
pub fn leaderboard_text(board: &Leaderboard, settings: &EconomySettings) -> String {
    board
        .top
        .iter()
        .map(|s| {
            format!(
                "{}. <@{}> · **{}**",
                s.rank,
                s.user_id,
                settings.money(s.balance)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
