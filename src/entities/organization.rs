//! Organization entity - A volunteer-involving organization within a tenant.
//!
//! Organizations own opportunities (and through them, shifts) and issue time
//! credits to members when auto-pay is enabled. They are never hard-deleted;
//! `status` moves between `pending` and `active`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    /// Unique identifier for the organization
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant this organization belongs to
    pub tenant_id: i64,
    /// Display name
    pub name: String,
    /// `"active"` or `"pending"`
    pub status: String,
    /// Whether approving hour logs automatically pays the volunteer
    pub auto_pay_enabled: bool,
    /// When the organization registered
    pub created_at: DateTimeUtc,
    /// When the organization was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Organization and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One organization has many opportunities
    #[sea_orm(has_many = "super::opportunity::Entity")]
    Opportunities,
    /// One organization has many administrators
    #[sea_orm(has_many = "super::organization_admin::Entity")]
    Admins,
}

impl Related<super::opportunity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Opportunities.def()
    }
}

impl Related<super::organization_admin::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Admins.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
