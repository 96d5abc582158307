//! Guild configuration entity - key/value economy settings (`config` table).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Guild setting database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "config")]
pub struct Model {
    /// Setting name (e.g., `"DailyAmount"`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// Setting value stored as text
    pub value: String,
}

/// `GuildConfig` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
