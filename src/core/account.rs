//! Account queries - balances, histories and rankings.
//!
//! Accounts are created lazily with the guild's default balance the first time they
//! are touched and are never deleted. All balance mutations go through
//! [`crate::core::ledger::Ledger`]; this module only reads, apart from creation.

use crate::{
    core::{AccountKey, settings, to_db_id, transaction as ledger_entries},
    entities::{Account, Transaction, account, transaction},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::debug;

/// Returns the account of `key`, creating it with the guild default balance if missing.
pub async fn get_or_create<C: ConnectionTrait>(db: &C, key: AccountKey) -> Result<account::Model> {
    if let Some(existing) = Account::find_by_id(key.db_user_id()).one(db).await? {
        return Ok(existing);
    }

    let default_balance = settings::load(db).await?.default_balance;
    let inserted = Account::insert(account::ActiveModel {
        user_id: Set(key.db_user_id()),
        balance: Set(default_balance),
    })
    .on_conflict(
        OnConflict::column(account::Column::UserId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    if inserted > 0 {
        debug!("Created account {key} with balance {default_balance}");
    }

    Account::find_by_id(key.db_user_id())
        .one(db)
        .await?
        .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("account {key}")).into())
}

/// Current balance of `key`.
pub async fn balance<C: ConnectionTrait>(db: &C, key: AccountKey) -> Result<i64> {
    Ok(get_or_create(db, key).await?.balance)
}

/// Latest transactions of `key`, newest first. `None` returns the whole history.
pub async fn transactions<C: ConnectionTrait>(
    db: &C,
    key: AccountKey,
    limit: Option<u64>,
) -> Result<Vec<transaction::Model>> {
    ledger_entries::for_user(db, key.user_id, limit).await
}

/// Net balance change of `key` from transactions recorded strictly after `since`.
pub async fn balance_variation<C: ConnectionTrait>(
    db: &C,
    key: AccountKey,
    since: DateTime<Utc>,
) -> Result<i64> {
    let entries = Transaction::find()
        .filter(transaction::Column::UserId.eq(to_db_id(key.user_id)))
        .filter(transaction::Column::Timestamp.gt(since))
        .all(db)
        .await?;
    Ok(entries.iter().map(|t| t.amount).sum())
}

/// All accounts of the guild, richest first. Equal balances keep user ID order.
pub async fn accounts_by_balance<C: ConnectionTrait>(db: &C) -> Result<Vec<account::Model>> {
    Account::find()
        .order_by_desc(account::Column::Balance)
        .order_by_asc(account::Column::UserId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// 1-based position of `key` in [`accounts_by_balance`], creating the account if needed.
pub async fn rank<C: ConnectionTrait>(db: &C, key: AccountKey) -> Result<usize> {
    get_or_create(db, key).await?;
    let accounts = accounts_by_balance(db).await?;
    let position = accounts
        .iter()
        .position(|a| a.user_id == key.db_user_id())
        .unwrap_or(accounts.len());
    Ok(position + 1)
}
