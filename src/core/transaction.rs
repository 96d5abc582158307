//! Transaction business logic - ledger entries, their identifiers and retention.
//!
//! Every balance mutation records exactly one transaction (see [`crate::core::ledger`]).
//! Identifiers are derived from the entry itself rather than from a sequence:
//! the creation second, the owner and the absolute amount, packed as LEB128 varints
//! and encoded with URL-safe unpadded base64. They are short enough to type in a
//! command and decode back to their components. Two entries with the same owner,
//! absolute amount and second share an identifier; the ledger rejects the later one.

use crate::{
    core::{AccountKey, from_db_id, to_db_id},
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::{debug, info};

/// Number of transactions shown by default in account summaries
pub const DEFAULT_HISTORY_LIMIT: u64 = 5;

/// Deterministic transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

/// Components packed into a [`TransactionId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Creation time in whole seconds since the Unix epoch
    pub timestamp: i64,
    /// Owner of the transaction
    pub user_id: u64,
    /// Absolute amount
    pub magnitude: u64,
}

impl TransactionId {
    /// Builds the identifier of a transaction of `amount` for `user_id` at `timestamp`.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, user_id: u64, amount: i64) -> Self {
        // Timestamps before the epoch never occur; clamp instead of wrapping.
        #[allow(clippy::cast_sign_loss)]
        let seconds = timestamp.timestamp().max(0) as u64;

        let mut bytes = Vec::with_capacity(20);
        for value in [seconds, user_id, amount.unsigned_abs()] {
            write_varint(&mut bytes, value);
        }
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decodes an identifier back into its components.
    ///
    /// Returns `None` for anything that was not produced by [`TransactionId::new`].
    #[must_use]
    pub fn decode(id: &str) -> Option<IdParts> {
        let bytes = URL_SAFE_NO_PAD.decode(id).ok()?;
        let mut cursor = bytes.as_slice();
        let seconds = read_varint(&mut cursor)?;
        let user_id = read_varint(&mut cursor)?;
        let magnitude = read_varint(&mut cursor)?;
        if !cursor.is_empty() {
            return None;
        }
        Some(IdParts {
            timestamp: i64::try_from(seconds).ok()?,
            user_id,
            magnitude,
        })
    }

    /// The textual identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        // Cast safety: masked to 7 bits.
        #[allow(clippy::cast_possible_truncation)]
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(input: &mut &[u8]) -> Option<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let (&byte, rest) = input.split_first()?;
        *input = rest;
        value |= u64::from(byte & 0x7f).checked_shl(shift)?;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

/// Inserts a ledger row for a mutation that was just applied.
///
/// Fails with [`Error::TransactionIdCollision`] when an entry with the same identifier
/// already exists; callers run inside a database transaction and roll back.
pub(crate) async fn insert<C: ConnectionTrait>(
    db: &C,
    key: AccountKey,
    amount: i64,
    reason: &str,
    timestamp: DateTime<Utc>,
) -> Result<transaction::Model> {
    let id = TransactionId::new(timestamp, key.user_id, amount);
    if Transaction::find_by_id(id.as_str()).one(db).await?.is_some() {
        return Err(Error::TransactionIdCollision { id: id.into() });
    }

    let model = transaction::ActiveModel {
        id: Set(id.into()),
        timestamp: Set(timestamp),
        amount: Set(amount),
        reason: Set(reason.to_string()),
        user_id: Set(key.db_user_id()),
    };
    Ok(model.insert(db).await?)
}

/// Retrieves a transaction by its identifier.
pub async fn get<C: ConnectionTrait>(db: &C, id: &str) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Retrieves a transaction or fails with [`Error::TransactionNotFound`].
pub async fn get_existing<C: ConnectionTrait>(db: &C, id: &str) -> Result<transaction::Model> {
    get(db, id).await?.ok_or_else(|| Error::TransactionNotFound { id: id.to_string() })
}

/// Replaces the reason of a transaction. Amount, owner and time never change.
pub async fn update_reason<C: ConnectionTrait>(
    db: &C,
    id: &str,
    reason: &str,
) -> Result<transaction::Model> {
    let existing = get_existing(db, id).await?;
    let mut model: transaction::ActiveModel = existing.into();
    model.reason = Set(reason.to_string());
    let updated = model.update(db).await?;
    debug!("Reason of transaction {id} updated");
    Ok(updated)
}

/// Deletes a ledger row. The balance is left untouched; use a cancellation to revert it.
pub async fn delete<C: ConnectionTrait>(db: &C, id: &str) -> Result<()> {
    let result = Transaction::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::TransactionNotFound { id: id.to_string() });
    }
    info!("Transaction {id} deleted");
    Ok(())
}

/// Transactions of one account, newest first. `None` returns the full history.
pub async fn for_user<C: ConnectionTrait>(
    db: &C,
    user_id: u64,
    limit: Option<u64>,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(to_db_id(user_id)))
        .order_by_desc(transaction::Column::Timestamp)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Most recent transactions of the whole guild, newest first.
pub async fn latest<C: ConnectionTrait>(
    db: &C,
    limit: Option<u64>,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .order_by_desc(transaction::Column::Timestamp)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Guild transactions recorded strictly after `since`, newest first.
pub async fn since<C: ConnectionTrait>(
    db: &C,
    since: DateTime<Utc>,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::Timestamp.gt(since))
        .order_by_desc(transaction::Column::Timestamp)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes every transaction older than `cutoff`. Returns the number of purged rows.
pub async fn purge_expired<C: ConnectionTrait>(db: &C, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = Transaction::delete_many()
        .filter(transaction::Column::Timestamp.lt(cutoff))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!("Purged {} expired transactions", result.rows_affected);
    }
    Ok(result.rows_affected)
}

/// Owner of a transaction row.
#[must_use]
pub const fn owner(model: &transaction::Model) -> u64 {
    from_db_id(model.user_id)
}
