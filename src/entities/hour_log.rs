//! Hour log entity - Self-reported volunteering hours awaiting verification.
//!
//! Hours are stored as hundredths of an hour in `hours_hundredths`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Hour log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hour_logs")]
pub struct Model {
    /// Unique identifier for the log
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Volunteer who logged the hours
    pub user_id: i64,
    /// Organization the hours were given to
    pub organization_id: i64,
    /// Opportunity, if the hours relate to one
    pub opportunity_id: Option<i64>,
    /// Day the hours were worked
    pub date: Date,
    /// Hours worked, in hundredths
    pub hours_hundredths: i64,
    /// What the volunteer did
    pub description: String,
    /// `"pending"`, `"approved"` or `"declined"`
    pub status: String,
    /// When the log was submitted
    pub created_at: DateTimeUtc,
    /// Admin who reviewed it
    pub reviewed_by: Option<i64>,
    /// When it was reviewed
    pub reviewed_at: Option<DateTimeUtc>,
}

impl Model {
    /// Logged hours as a fixed-point value
    #[must_use]
    pub fn hours(&self) -> Decimal {
        crate::core::credits::from_hundredths(self.hours_hundredths)
    }
}

/// Defines relationships between `HourLog` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each hour log belongs to one organization
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
