//! Saved throw entity - named dice throws kept per guild (`throws` table).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saved throw database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "throws")]
pub struct Model {
    /// Name chosen by the user
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    /// Serialized dice, see [`crate::core::dice::DiceThrow::to_storage`]
    pub throw: String,
}

/// `SavedThrow` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
