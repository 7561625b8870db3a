//! Shift entity - A bounded-capacity time slot under an opportunity.
//!
//! `booked_count` is a maintained counter; it is only ever changed through
//! conditional updates so that `0 <= booked_count <= capacity` holds.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shift database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shifts")]
pub struct Model {
    /// Unique identifier for the shift
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Opportunity this shift belongs to
    pub opportunity_id: i64,
    /// Shift start
    pub start_time: DateTimeUtc,
    /// Shift end
    pub end_time: DateTimeUtc,
    /// Maximum number of volunteers
    pub capacity: i32,
    /// Slots currently booked
    pub booked_count: i32,
}

/// Defines relationships between Shift and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each shift belongs to one opportunity
    #[sea_orm(
        belongs_to = "super::opportunity::Entity",
        from = "Column::OpportunityId",
        to = "super::opportunity::Column::Id"
    )]
    Opportunity,
}

impl Related<super::opportunity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Opportunity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
