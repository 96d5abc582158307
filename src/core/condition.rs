//! Typed conditions - persisted per-(flag, target) values gating actions.
//!
//! A flag declares its storage name and payload type through [`ConditionFlag`].
//! Rows live in the `conditions` table under the id `"<NAME>@<target>"` with a JSON
//! payload. Reading a missing condition persists its default.

use crate::{
    core::AccountKey,
    entities::{Condition, condition},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait, Set};
use serde::{Serialize, de::DeserializeOwned};

/// A kind of condition and the type of value it holds.
pub trait ConditionFlag {
    /// Name used in storage identifiers
    const NAME: &'static str;
    /// Payload type
    type Value: Serialize + DeserializeOwned + Default;
}

/// Local calendar date of a user's last daily stipend claim.
#[derive(Debug, Clone, Copy)]
pub struct LastDailyClaim;

impl ConditionFlag for LastDailyClaim {
    const NAME: &'static str = "LastDaily";
    type Value = Option<NaiveDate>;
}

/// Storage identifier of flag `F` for `target` (a user or channel ID).
#[must_use]
pub fn condition_id<F: ConditionFlag>(target: u64) -> String {
    format!("{}@{target}", F::NAME)
}

/// Reads the value of flag `F` for the account, persisting the default when missing.
pub async fn get<F, C>(db: &C, key: AccountKey) -> Result<F::Value>
where
    F: ConditionFlag,
    C: ConnectionTrait,
{
    let id = condition_id::<F>(key.user_id);
    if let Some(row) = Condition::find_by_id(id.as_str()).one(db).await? {
        return Ok(serde_json::from_str(&row.value)?);
    }

    let value = F::Value::default();
    Condition::insert(condition::ActiveModel {
        id: Set(id),
        value: Set(serde_json::to_string(&value)?),
    })
    .on_conflict(OnConflict::column(condition::Column::Id).do_nothing().to_owned())
    .exec_without_returning(db)
    .await?;
    Ok(value)
}

/// Stores the value of flag `F` for the account.
pub async fn set<F, C>(db: &C, key: AccountKey, value: &F::Value) -> Result<()>
where
    F: ConditionFlag,
    C: ConnectionTrait,
{
    Condition::insert(condition::ActiveModel {
        id: Set(condition_id::<F>(key.user_id)),
        value: Set(serde_json::to_string(value)?),
    })
    .on_conflict(
        OnConflict::column(condition::Column::Id)
            .update_column(condition::Column::Value)
            .to_owned(),
    )
    .exec(db)
    .await?;
    Ok(())
}

/// Deletes the stored value of flag `F` for the account.
pub async fn clear<F, C>(db: &C, key: AccountKey) -> Result<()>
where
    F: ConditionFlag,
    C: ConnectionTrait,
{
    Condition::delete_by_id(condition_id::<F>(key.user_id))
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    struct Streak;

    impl ConditionFlag for Streak {
        const NAME: &'static str = "Streak";
        type Value = u32;
    }

    #[test]
    fn test_condition_id_format() {
        assert_eq!(condition_id::<LastDailyClaim>(42), "LastDaily@42");
        assert_eq!(condition_id::<Streak>(7), "Streak@7");
    }

    #[tokio::test]
    async fn test_default_is_persisted_on_first_read() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(get::<LastDailyClaim, _>(&db, key(1)).await?, None);

        let row = Condition::find_by_id("LastDaily@1").one(&db).await?.unwrap();
        assert_eq!(row.value, "null");
        Ok(())
    }

    #[tokio::test]
    async fn test_set_get_clear() -> Result<()> {
        let db = setup_test_db().await?;
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        set::<LastDailyClaim, _>(&db, key(1), &Some(date)).await?;
        assert_eq!(get::<LastDailyClaim, _>(&db, key(1)).await?, Some(date));
        // Other users and other flags are independent
        assert_eq!(get::<LastDailyClaim, _>(&db, key(2)).await?, None);
        assert_eq!(get::<Streak, _>(&db, key(1)).await?, 0);

        set::<Streak, _>(&db, key(1), &3).await?;
        set::<Streak, _>(&db, key(1), &4).await?;
        assert_eq!(get::<Streak, _>(&db, key(1)).await?, 4);

        clear::<LastDailyClaim, _>(&db, key(1)).await?;
        assert!(Condition::find_by_id("LastDaily@1").one(&db).await?.is_none());
        assert_eq!(get::<LastDailyClaim, _>(&db, key(1)).await?, None);
        Ok(())
    }
}
