//! Organization admin entity - The owner/admin set of an organization.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization admin database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organization_admins")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Organization administered
    pub organization_id: i64,
    /// Administrator's user id
    pub user_id: i64,
    /// `"owner"` or `"admin"`
    pub role: String,
    /// When the role was granted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `OrganizationAdmin` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each admin row belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
