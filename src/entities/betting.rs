//! Betting entity - one open betting session per channel.
//!
//! Choices are stored lowercase and comma-joined in declaration order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Betting session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bettings")]
pub struct Model {
    /// Channel hosting the session
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: i64,
    /// Session title shown on the board
    pub title: String,
    /// Comma-joined lowercase choices
    pub choices: String,
    /// Board message, 0 until it is posted
    pub message_id: i64,
    /// Minimum stake accepted
    pub minimal_bet: i64,
    /// User who opened the session
    pub author_id: i64,
}

/// Defines relationships between Betting and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One session has many bets
    #[sea_orm(has_many = "super::bet::Entity")]
    Bets,
}

impl Related<super::bet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
