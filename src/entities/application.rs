//! Application entity - A volunteer's application to an opportunity.
//!
//! `shift_id` is `None` for flexible applications. `status` is one of
//! `"pending"`, `"approved"`, `"declined"` or `"withdrawn"`.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Application database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    /// Unique identifier for the application
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Opportunity applied to
    pub opportunity_id: i64,
    /// Booked shift, if any
    pub shift_id: Option<i64>,
    /// Applicant
    pub user_id: i64,
    /// Current status
    pub status: String,
    /// Message from the applicant
    pub message: String,
    /// When the application was submitted
    pub created_at: DateTimeUtc,
    /// Admin who approved or declined it
    pub decided_by: Option<i64>,
    /// When it left the pending state
    pub decided_at: Option<DateTimeUtc>,
}

/// Defines relationships between Application and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each application belongs to one opportunity
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
