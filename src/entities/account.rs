//! Account entity - one row per user holding the current balance.
//!
//! Balances are integers in the guild currency. The table carries a
//! `CHECK (balance >= 0)` constraint added at schema creation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Discord user ID of the owner
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Current balance, never negative
    pub balance: i64,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
