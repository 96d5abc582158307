//! Condition entity - persisted flags gating one-per-period actions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Condition database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conditions")]
pub struct Model {
    /// `"<flag>@<target id>"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// JSON-encoded payload
    pub value: String,
}

/// `Condition` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
