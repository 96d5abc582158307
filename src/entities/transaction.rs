//! Transaction entity - one ledger entry per balance mutation.
//!
//! The `id` is derived from (`timestamp` second, `user_id`, |`amount`|), see
//! [`crate::core::transaction::TransactionId`]. Rows expire after the retention window.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Short identifier shared with users
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// When the transaction was recorded
    pub timestamp: DateTimeUtc,
    /// Signed balance delta (positive for credits, negative for debits)
    pub amount: i64,
    /// Free-text reason, editable
    pub reason: String,
    /// Discord user ID of the account owner
    pub user_id: i64,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::UserId",
        to = "super::account::Column::UserId"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
