//! Shift and capacity management.
//!
//! Capacity is enforced with a single conditional update on the shift row:
//! `UPDATE shifts SET booked_count = booked_count + 1 WHERE id = ? AND booked_count < capacity`.
//! The check and the increment are one statement, so two callers racing for the
//! last slot cannot both succeed regardless of interleaving. [`reserve`] and
//! [`release`] take any [`ConnectionTrait`] so they run inside the caller's
//! transaction and roll back with it.

use crate::{
    context::RequestContext,
    core::{opportunity::get_opportunity, organization::require_admin},
    entities::{Shift, shift},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Payload for creating a shift
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShift {
    /// Opportunity the shift belongs to
    pub opportunity_id: i64,
    /// Shift start
    pub start_time: DateTime<Utc>,
    /// Shift end
    pub end_time: DateTime<Utc>,
    /// Maximum number of volunteers, at least 1
    pub capacity: i32,
}

/// A successfully booked slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reservation {
    /// Shift booked
    pub shift_id: i64,
    /// Volunteer holding the slot
    pub user_id: i64,
    /// Slots booked after this reservation
    pub booked_count: i32,
    /// Shift capacity
    pub capacity: i32,
}

/// Creates a shift under an opportunity of an organization the caller administers.
#[instrument(skip(db, new), fields(opportunity_id = new.opportunity_id))]
pub async fn create_shift(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    new: NewShift,
) -> Result<shift::Model> {
    if new.capacity <= 0 {
        return Err(Error::Validation {
            message: format!("Shift capacity must be positive, got {}", new.capacity),
        });
    }
    if new.end_time <= new.start_time {
        return Err(Error::Validation {
            message: "Shift must end after it starts".to_string(),
        });
    }

    let txn = db.begin().await?;
    let opportunity = get_opportunity(&txn, ctx.tenant_id, new.opportunity_id).await?;
    require_admin(&txn, ctx, opportunity.organization_id, "create shifts").await?;

    let created = shift::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        opportunity_id: Set(new.opportunity_id),
        start_time: Set(new.start_time),
        end_time: Set(new.end_time),
        capacity: Set(new.capacity),
        booked_count: Set(0),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(shift_id = created.id, capacity = created.capacity, "Shift created");
    Ok(created)
}

/// Finds a shift by id within the tenant.
pub async fn get_shift<C>(db: &C, tenant_id: i64, shift_id: i64) -> Result<shift::Model>
where
    C: ConnectionTrait,
{
    Shift::find_by_id(shift_id)
        .filter(shift::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "shift",
            id: shift_id,
        })
}

/// All shifts of an opportunity, earliest first.
pub async fn shifts_for_opportunity(
    db: &DatabaseConnection,
    tenant_id: i64,
    opportunity_id: i64,
) -> Result<Vec<shift::Model>> {
    Shift::find()
        .filter(shift::Column::TenantId.eq(tenant_id))
        .filter(shift::Column::OpportunityId.eq(opportunity_id))
        .order_by_asc(shift::Column::StartTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Books one slot on the shift, or fails with [`Error::CapacityExceeded`].
///
/// Must be called inside the transaction that also persists the application
/// linking `user_id` to the shift. The slot count only grows through a
/// conditional update guarded by `booked_count < capacity`, so concurrent callers
/// can never overbook.
///
/// # Arguments
/// * `db` - Connection or open transaction
/// * `tenant_id` - Tenant owning the shift
/// * `shift_id` - Shift to book
/// * `user_id` - Volunteer taking the slot
///
/// # Returns
/// The [`Reservation`] with the shift's new booked count
pub async fn reserve<C>(db: &C, tenant_id: i64, shift_id: i64, user_id: i64) -> Result<Reservation>
where
    C: ConnectionTrait,
{
    let result = Shift::update_many()
        .col_expr(
            shift::Column::BookedCount,
            Expr::col(shift::Column::BookedCount).add(1),
        )
        .filter(shift::Column::Id.eq(shift_id))
        .filter(shift::Column::TenantId.eq(tenant_id))
        .filter(Expr::col(shift::Column::BookedCount).lt(Expr::col(shift::Column::Capacity)))
        .exec(db)
        .await?;

    let shift = get_shift(db, tenant_id, shift_id).await?;
    if result.rows_affected == 0 {
        debug!(shift_id, user_id, "Shift is full");
        return Err(Error::CapacityExceeded {
            shift_id,
            capacity: shift.capacity,
        });
    }

    debug!(
        shift_id,
        user_id,
        booked = shift.booked_count,
        capacity = shift.capacity,
        "Shift slot reserved"
    );
    Ok(Reservation {
        shift_id,
        user_id,
        booked_count: shift.booked_count,
        capacity: shift.capacity,
    })
}

/// Frees one slot on the shift. The counter never goes below zero.
pub async fn release<C>(db: &C, tenant_id: i64, shift_id: i64) -> Result<shift::Model>
where
    C: ConnectionTrait,
{
    let result = Shift::update_many()
        .col_expr(
            shift::Column::BookedCount,
            Expr::col(shift::Column::BookedCount).sub(1),
        )
        .filter(shift::Column::Id.eq(shift_id))
        .filter(shift::Column::TenantId.eq(tenant_id))
        .filter(shift::Column::BookedCount.gt(0))
        .exec(db)
        .await?;

    let shift = get_shift(db, tenant_id, shift_id).await?;
    if result.rows_affected == 0 {
        warn!(shift_id, "Release on a shift with no bookings");
    } else {
        debug!(shift_id, booked = shift.booked_count, "Shift slot released");
    }
    Ok(shift)
}
