//! Shared test utilities.
//!
//! This module provides helpers for setting up in-memory guild stores and ledgers
//! whose clock the test controls.

use crate::{
    config::database::create_tables,
    core::{
        AccountKey,
        ledger::{Ledger, RetentionPolicy},
        settings::{self, EconomySettings},
    },
    errors::Result,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Mutex};

/// Guild every test account lives in
pub const TEST_GUILD: u64 = 4242;

/// Creates an in-memory `SQLite` database with all tables initialized and the
/// default economy settings seeded.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    settings::seed_defaults(&db, &EconomySettings::default()).await?;
    Ok(db)
}

/// Account key of `user_id` in the test guild.
#[must_use]
pub const fn key(user_id: u64) -> AccountKey {
    AccountKey::new(TEST_GUILD, user_id)
}

/// Manually driven clock.
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    /// Clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    /// Current frozen time.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    /// Moves the clock forward.
    #[allow(clippy::unwrap_used)]
    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }

    /// Jumps to `to`.
    #[allow(clippy::unwrap_used)]
    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.lock().unwrap() = to;
    }
}

/// Noon UTC on 2024-06-01, the start of every test clock.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Ledger with default retention and a clock frozen at [`test_start`].
#[must_use]
pub fn test_ledger() -> Ledger {
    test_ledger_with_clock().0
}

/// Ledger with default retention plus a handle to drive its clock.
#[must_use]
pub fn test_ledger_with_clock() -> (Ledger, TestClock) {
    let clock = TestClock::new(test_start());
    let handle = clock.clone();
    let ledger = Ledger::with_clock(RetentionPolicy::default(), Arc::new(move || clock.now()));
    (ledger, handle)
}
