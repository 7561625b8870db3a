//! Badge entity - An achievement granted to a volunteer by policy.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Badge database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "badges")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Recipient
    pub user_id: i64,
    /// Badge name (e.g., "Ten Hours")
    pub name: String,
    /// Icon identifier for the presentation layer
    pub icon: String,
    /// When it was granted
    pub awarded_at: DateTimeUtc,
}

/// Badge has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
