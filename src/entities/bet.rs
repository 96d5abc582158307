//! Bet entity - one stake per user per session.
//!
//! A unique index on (`channel_id`, `user_id`) is created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bets")]
pub struct Model {
    /// Surrogate identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Bettor
    pub user_id: i64,
    /// Session channel
    pub channel_id: i64,
    /// Lowercase choice label
    pub choice: String,
    /// Total staked so far
    pub amount: i64,
}

/// Defines relationships between Bet and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each bet belongs to one session
    #[sea_orm(
        belongs_to = "super::betting::Entity",
        from = "Column::ChannelId",
        to = "super::betting::Column::ChannelId"
    )]
    Betting,
}

impl Related<super::betting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Betting.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
