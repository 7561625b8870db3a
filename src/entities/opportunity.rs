//! Opportunity entity - A volunteering opportunity published by an organization.
//!
//! An opportunity belongs to exactly one organization and may be split into
//! bounded-capacity shifts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Opportunity database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "opportunities")]
pub struct Model {
    /// Unique identifier for the opportunity
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// Short title shown in listings
    pub title: String,
    /// Long-form description
    pub description: String,
    /// Listing category (e.g., "environment", "education")
    pub category: String,
    /// Comma-separated skills wanted
    pub skills: String,
    /// First day of the opportunity, if bounded
    pub start_date: Option<Date>,
    /// Last day of the opportunity, if bounded
    pub end_date: Option<Date>,
    /// Free-text location
    pub location: String,
    /// When the opportunity was published
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Opportunity and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each opportunity belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    /// One opportunity has many shifts
    #[sea_orm(has_many = "super::shift::Entity")]
    Shifts,
    /// One opportunity has many applications
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::shift::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shifts.def()
    }
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
