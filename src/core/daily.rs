//! Daily stipend - one claim per local calendar day, shrinking as the balance grows.
//!
//! Balances up to 10% of the cap receive the full amount. Above that the stipend
//! decreases linearly: `amount * (1 - (balance - 0.1 * cap) / cap)`, rounded half
//! to even. Nothing is paid once the balance reaches the cap.

use crate::{
    core::{
        AccountKey, account,
        condition::{self, LastDailyClaim},
        ledger::Ledger,
        settings::{self, EconomySettings},
    },
    entities::transaction,
    errors::{Error, Result},
};
use chrono::{Local, NaiveDate};
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::info;

/// Stipend `settings` grant to an account holding `balance`, before any gating.
#[must_use]
pub fn quote(balance: i64, settings: &EconomySettings) -> i64 {
    let amount = settings.daily_amount;
    let limit = settings.daily_limit;
    if limit <= 0 {
        return 0;
    }

    // Cast safety: amounts stay far below 2^52 and the result lies in [0, amount].
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    {
        let ignored = 0.1 * limit as f64;
        let balance = balance as f64;
        if balance <= ignored {
            return amount;
        }
        let reduction = (balance - ignored) / limit as f64;
        (amount as f64 * (1.0 - reduction)).round_ties_even() as i64
    }
}

/// Result of a successful claim.
#[derive(Debug, Clone)]
pub struct DailyClaim {
    /// Ledger entry of the deposit
    pub transaction: transaction::Model,
    /// Amount paid
    pub amount: i64,
    /// Balance after the deposit
    pub balance: i64,
    /// Local date the claim counts for
    pub date: NaiveDate,
}

/// Claims today's stipend for the account.
///
/// Checks run in order: stipend disabled, already claimed today, balance at or over
/// the cap, decayed amount below one. Rejected claims change nothing. The deposit
/// and the claim date are stored in one database transaction.
pub async fn claim_daily<C>(ledger: &Ledger, db: &C, key: AccountKey) -> Result<DailyClaim>
where
    C: ConnectionTrait + TransactionTrait,
{
    let settings = settings::load(db).await?;
    if !settings.daily_enabled() {
        return Err(Error::DailyDisabled);
    }

    let today = ledger.now().with_timezone(&Local).date_naive();
    let txn = db.begin().await?;

    let last_claim = condition::get::<LastDailyClaim, _>(&txn, key).await?;
    if last_claim == Some(today) {
        return Err(Error::DailyAlreadyClaimed);
    }

    let balance = account::balance(&txn, key).await?;
    if balance >= settings.daily_limit {
        return Err(Error::DailyCapReached {
            cap: settings.daily_limit,
        });
    }

    let amount = quote(balance, &settings);
    if amount <= 0 {
        return Err(Error::DailyAmountTooSmall);
    }

    let reason = format!("Daily stipend for {}", today.format("%Y-%m-%d"));
    let transaction = ledger.deposit(&txn, key, amount, &reason).await?;
    condition::set::<LastDailyClaim, _>(&txn, key, &Some(today)).await?;
    txn.commit().await?;

    info!("{key} claimed a daily stipend of {amount}");
    Ok(DailyClaim {
        transaction,
        amount,
        balance: balance + amount,
        date: today,
    })
}
