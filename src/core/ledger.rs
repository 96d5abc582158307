//! Ledger - every balance mutation and the transaction it records.
//!
//! Each operation runs in its own database transaction: ensure the account exists,
//! apply the change with a guarded atomic update, insert the ledger row, optionally
//! purge expired rows, commit. Operations accept any connection that can open a
//! transaction, so gambling and the daily stipend nest them (as savepoints) inside
//! their own transaction.
//!
//! Balances never go negative. Debits use
//! `UPDATE accounts SET balance = balance + delta WHERE user_id = ? AND balance >= -delta`
//! and absolute writes use a compare-and-swap on the observed balance, so concurrent
//! commands cannot lose updates.

use crate::{
    core::{AccountKey, account as accounts, settings, transaction as entries},
    entities::{Account, account, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info, instrument};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Reason recorded by [`Ledger::reset`]
pub const RESET_REASON: &str = "Account reset";

/// How long transactions are kept and how often expired ones are purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Age after which a transaction expires
    pub retention: chrono::Duration,
    /// Minimum time between two purges
    pub interval: std::time::Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention: chrono::Duration::days(14),
            interval: std::time::Duration::from_secs(3600),
        }
    }
}

/// Throttles expired-transaction purges to one per interval for the whole process.
#[derive(Debug)]
pub struct CleanupScheduler {
    last_run: AtomicI64,
    interval_secs: i64,
}

impl CleanupScheduler {
    /// Scheduler that has never run.
    #[must_use]
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            last_run: AtomicI64::new(0),
            interval_secs: i64::try_from(interval.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Claims the next purge if the interval elapsed since the last one.
    ///
    /// Exactly one caller wins when several race for the same slot.
    pub fn try_claim(&self, now: DateTime<Utc>) -> bool {
        let now = now.timestamp();
        let last = self.last_run.load(Ordering::Acquire);
        if last.saturating_add(self.interval_secs) >= now {
            return false;
        }
        self.last_run
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Entry point for balance mutations.
#[derive(Clone)]
pub struct Ledger {
    clock: Clock,
    policy: RetentionPolicy,
    scheduler: Arc<CleanupScheduler>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("policy", &self.policy)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Ledger reading the system clock.
    #[must_use]
    pub fn new(policy: RetentionPolicy) -> Self {
        Self::with_clock(policy, Arc::new(Utc::now))
    }

    /// Ledger reading time from `clock`.
    #[must_use]
    pub fn with_clock(policy: RetentionPolicy, clock: Clock) -> Self {
        Self {
            clock,
            scheduler: Arc::new(CleanupScheduler::new(policy.interval)),
            policy,
        }
    }

    /// Current time according to the ledger clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Retention settings in use.
    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Credits `amount` (≥ 0) to the account.
    pub async fn deposit<C>(
        &self,
        db: &C,
        key: AccountKey,
        amount: i64,
        reason: &str,
    ) -> Result<transaction::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if amount < 0 {
            return Err(Error::InvalidAmount { amount });
        }
        self.apply(db, key, amount, reason).await
    }

    /// Debits the magnitude of `amount` from the account.
    pub async fn withdraw<C>(
        &self,
        db: &C,
        key: AccountKey,
        amount: i64,
        reason: &str,
    ) -> Result<transaction::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let magnitude = amount.checked_abs().ok_or(Error::InvalidAmount { amount })?;
        self.apply(db, key, -magnitude, reason).await
    }

    /// Sets the balance to `amount` (≥ 0), recording the difference.
    #[instrument(skip(self, db))]
    pub async fn set<C>(
        &self,
        db: &C,
        key: AccountKey,
        amount: i64,
        reason: &str,
    ) -> Result<transaction::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if amount < 0 {
            return Err(Error::InvalidAmount { amount });
        }

        let txn = db.begin().await?;
        let observed = accounts::get_or_create(&txn, key).await?.balance;
        let result = Account::update_many()
            .col_expr(account::Column::Balance, Expr::value(amount))
            .filter(account::Column::UserId.eq(key.db_user_id()))
            .filter(account::Column::Balance.eq(observed))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::ConcurrentUpdate {
                user_id: key.user_id,
            });
        }

        let entry = self.record(&txn, key, amount - observed, reason).await?;
        txn.commit().await?;
        info!("Balance of {key} set to {amount}");
        Ok(entry)
    }

    /// Returns the account to the guild default balance.
    pub async fn reset<C>(&self, db: &C, key: AccountKey) -> Result<transaction::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let default_balance = settings::load(db).await?.default_balance;
        self.set(db, key, default_balance, RESET_REASON).await
    }

    /// Reverts transaction `id` of the account by recording its opposite.
    #[instrument(skip(self, db))]
    pub async fn cancel<C>(&self, db: &C, key: AccountKey, id: &str) -> Result<transaction::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;
        let original = entries::get_existing(&txn, id).await?;
        if entries::owner(&original) != key.user_id {
            return Err(Error::TransactionNotOwned { id: id.to_string() });
        }

        let entry = self
            .apply(&txn, key, -original.amount, &format!("Cancels {id}"))
            .await?;
        txn.commit().await?;
        Ok(entry)
    }

    /// Moves `amount` (≥ 1) from one account to another. Returns (debit, credit).
    #[instrument(skip(self, db))]
    pub async fn transfer<C>(
        &self,
        db: &C,
        from: AccountKey,
        to: AccountKey,
        amount: i64,
        reason: &str,
    ) -> Result<(transaction::Model, transaction::Model)>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if amount < 1 {
            return Err(Error::InvalidAmount { amount });
        }
        if from == to {
            return Err(Error::SelfTransfer);
        }

        let txn = db.begin().await?;
        let debit = self.apply(&txn, from, -amount, reason).await?;
        let credit = self.apply(&txn, to, amount, reason).await?;
        txn.commit().await?;
        Ok((debit, credit))
    }

    /// Adds `delta` to the balance and records it.
    async fn apply<C>(
        &self,
        db: &C,
        key: AccountKey,
        delta: i64,
        reason: &str,
    ) -> Result<transaction::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;
        let current = accounts::get_or_create(&txn, key).await?.balance;

        let mut update = Account::update_many()
            .col_expr(
                account::Column::Balance,
                Expr::col(account::Column::Balance).add(delta),
            )
            .filter(account::Column::UserId.eq(key.db_user_id()));
        if delta < 0 {
            update = update.filter(account::Column::Balance.gte(-delta));
        }
        if update.exec(&txn).await?.rows_affected == 0 {
            return Err(Error::InsufficientFunds {
                current,
                required: -delta,
            });
        }

        let entry = self.record(&txn, key, delta, reason).await?;
        txn.commit().await?;
        debug!("Applied {delta:+} to {key}");
        Ok(entry)
    }

    async fn record<C: ConnectionTrait>(
        &self,
        db: &C,
        key: AccountKey,
        delta: i64,
        reason: &str,
    ) -> Result<transaction::Model> {
        let now = self.now();
        let entry = entries::insert(db, key, delta, reason, now).await?;
        if self.scheduler.try_claim(now) {
            entries::purge_expired(db, now - self.policy.retention).await?;
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_deposit_then_withdraw_restores_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        let before = accounts::balance(&db, key(1)).await?;
        let credit = ledger.deposit(&db, key(1), 75, "salary").await?;
        clock.advance(Duration::seconds(1));
        let debit = ledger.withdraw(&db, key(1), 75, "rent").await?;

        assert_eq!(accounts::balance(&db, key(1)).await?, before);
        assert_eq!(credit.amount, 75);
        assert_eq!(debit.amount, -75);
        assert_eq!(accounts::transactions(&db, key(1), None).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_normalizes_sign() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        let entry = ledger.withdraw(&db, key(1), -40, "").await?;
        assert_eq!(entry.amount, -40);
        assert_eq!(accounts::balance(&db, key(1)).await?, 60);
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_changes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();

        let result = ledger.withdraw(&db, key(1), 101, "too much").await;
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                current: 100,
                required: 101
            })
        ));
        assert_eq!(accounts::balance(&db, key(1)).await?, 100);
        assert!(accounts::transactions(&db, key(1), None).await?.is_empty());

        // Draining to exactly zero is allowed
        ledger.withdraw(&db, key(1), 100, "all of it").await?;
        assert_eq!(accounts::balance(&db, key(1)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_amounts_change_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();

        let result = ledger.deposit(&db, key(1), -5, "").await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -5 })));

        let result = ledger.set(&db, key(1), -1, "").await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -1 })));

        let result = ledger.withdraw(&db, key(1), i64::MIN, "").await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = ledger.transfer(&db, key(1), key(2), 0, "").await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        let result = ledger.transfer(&db, key(1), key(1), 10, "").await;
        assert!(matches!(result, Err(Error::SelfTransfer)));

        assert!(crate::core::transaction::latest(&db, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_records_difference() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();

        let entry = ledger.set(&db, key(1), 30, "correction").await?;
        assert_eq!(entry.amount, -70);
        assert_eq!(accounts::balance(&db, key(1)).await?, 30);

        let entry = ledger.set(&db, key(1), 1000, "bonus").await?;
        assert_eq!(entry.amount, 970);
        assert_eq!(accounts::balance(&db, key(1)).await?, 1000);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_returns_to_default() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        ledger.deposit(&db, key(1), 400, "").await?;
        clock.advance(Duration::seconds(1));
        let entry = ledger.reset(&db, key(1)).await?;

        assert_eq!(entry.reason, RESET_REASON);
        assert_eq!(entry.amount, -400);
        assert_eq!(accounts::balance(&db, key(1)).await?, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_restores_previous_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        let spent = ledger.withdraw(&db, key(1), 60, "mistake").await?;
        clock.advance(Duration::seconds(1));
        let reversal = ledger.cancel(&db, key(1), &spent.id).await?;

        assert_eq!(reversal.amount, 60);
        assert_eq!(reversal.reason, format!("Cancels {}", spent.id));
        assert_eq!(accounts::balance(&db, key(1)).await?, 100);
        // History keeps both entries
        assert_eq!(accounts::transactions(&db, key(1), None).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_checks_owner_and_existence() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        let entry = ledger.deposit(&db, key(1), 10, "").await?;

        let result = ledger.cancel(&db, key(2), &entry.id).await;
        assert!(matches!(result, Err(Error::TransactionNotOwned { .. })));

        let result = ledger.cancel(&db, key(1), "missing").await;
        assert!(matches!(result, Err(Error::TransactionNotFound { .. })));

        assert_eq!(accounts::balance(&db, key(1)).await?, 110);
        assert_eq!(accounts::balance(&db, key(2)).await?, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_that_would_overdraw_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        let gift = ledger.deposit(&db, key(1), 50, "gift").await?;
        clock.advance(Duration::seconds(1));
        ledger.withdraw(&db, key(1), 120, "spent").await?;
        clock.advance(Duration::seconds(1));

        let result = ledger.cancel(&db, key(1), &gift.id).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert_eq!(accounts::balance(&db, key(1)).await?, 30);
        Ok(())
    }

    #[tokio::test]
    async fn test_id_collision_deposit_then_withdraw() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();

        let first = ledger.deposit(&db, key(1), 25, "first").await?;
        let result = ledger.withdraw(&db, key(1), 25, "second").await;

        assert!(matches!(
            result,
            Err(Error::TransactionIdCollision { ref id }) if *id == first.id
        ));
        assert_eq!(accounts::balance(&db, key(1)).await?, 125);
        let history = accounts::transactions(&db, key(1), None).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "first");
        Ok(())
    }

    #[tokio::test]
    async fn test_id_collision_withdraw_then_deposit() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();

        ledger.withdraw(&db, key(1), 25, "first").await?;
        let result = ledger.deposit(&db, key(1), 25, "second").await;

        assert!(matches!(result, Err(Error::TransactionIdCollision { .. })));
        assert_eq!(accounts::balance(&db, key(1)).await?, 75);
        assert_eq!(accounts::transactions(&db, key(1), None).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_same_second_different_users_do_not_collide() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        ledger.deposit(&db, key(1), 25, "").await?;
        ledger.deposit(&db, key(2), 25, "").await?;
        ledger.deposit(&db, key(1), 26, "").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_moves_money_atomically() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();

        let (debit, credit) = ledger.transfer(&db, key(1), key(2), 40, "lunch").await?;
        assert_eq!(debit.amount, -40);
        assert_eq!(credit.amount, 40);
        assert_eq!(accounts::balance(&db, key(1)).await?, 60);
        assert_eq!(accounts::balance(&db, key(2)).await?, 140);

        let result = ledger.transfer(&db, key(1), key(2), 61, "too much").await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert_eq!(accounts::balance(&db, key(1)).await?, 60);
        assert_eq!(accounts::balance(&db, key(2)).await?, 140);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_transactions_swept_on_write() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        ledger.deposit(&db, key(1), 1, "ancient").await?;
        clock.advance(Duration::days(15));
        ledger.deposit(&db, key(1), 2, "fresh").await?;

        let history = accounts::transactions(&db, key(1), None).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "fresh");
        // Balances are not affected by expiry
        assert_eq!(accounts::balance(&db, key(1)).await?, 103);
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_is_throttled() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        // First write claims the sweep slot
        ledger.deposit(&db, key(1), 1, "first").await?;
        clock.advance(Duration::minutes(30));
        ledger.deposit(&db, key(1), 2, "second").await?;

        // Backdated entry written through a clock in the past stays until the next slot
        clock.set(clock.now() - Duration::days(20));
        ledger.deposit(&db, key(1), 3, "backdated").await?;
        clock.set(clock.now() + Duration::days(20) + Duration::minutes(10));
        ledger.deposit(&db, key(1), 4, "within the hour").await?;
        assert_eq!(accounts::transactions(&db, key(1), None).await?.len(), 4);

        clock.advance(Duration::hours(1));
        ledger.deposit(&db, key(1), 5, "next slot").await?;
        assert_eq!(accounts::transactions(&db, key(1), None).await?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_cleanup_scheduler_claims_once_per_interval() {
        let scheduler = CleanupScheduler::new(std::time::Duration::from_secs(3600));
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(scheduler.try_claim(t0));
        assert!(!scheduler.try_claim(t0));
        assert!(!scheduler.try_claim(t0 + Duration::seconds(3600)));
        assert!(scheduler.try_claim(t0 + Duration::seconds(3601)));
    }
}
