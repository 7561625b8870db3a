//! Application state machine.
//!
//! An application moves `pending → approved | declined`, and the applicant may
//! withdraw a pending or approved application. Every transition is a single
//! conditional `UPDATE ... WHERE status IN (...)`, so of two racing decisions
//! exactly one changes the row and the other sees [`Error::NotPending`].
//!
//! Shift capacity is reserved in the same transaction that inserts the
//! application and released in the same transaction that declines or
//! withdraws it.

use crate::{
    context::RequestContext,
    core::{
        opportunity::get_opportunity,
        organization::{OrganizationStatus, get_organization, require_admin},
        shift::{get_shift, release, reserve},
    },
    entities::{Application, application},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Lifecycle status of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Awaiting an admin decision
    Pending,
    /// Accepted by an admin
    Approved,
    /// Rejected by an admin
    Declined,
    /// Cancelled by the applicant
    Withdrawn,
}

impl ApplicationStatus {
    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Statuses that block a second application to the same opportunity
    const ACTIVE: [Self; 2] = [Self::Pending, Self::Approved];
}

/// Application submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRequest {
    /// Opportunity applied to
    pub opportunity_id: i64,
    /// Shift to book, `None` for a flexible application
    pub shift_id: Option<i64>,
    /// Message to the organization
    pub message: String,
}

/// Outcome an admin may choose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Accept the applicant
    Approved,
    /// Reject the applicant and free any booked slot
    Declined,
}

impl From<DecisionStatus> for ApplicationStatus {
    fn from(status: DecisionStatus) -> Self {
        match status {
            DecisionStatus::Approved => Self::Approved,
            DecisionStatus::Declined => Self::Declined,
        }
    }
}

/// Decision payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Application being decided
    pub application_id: i64,
    /// Chosen outcome
    pub status: DecisionStatus,
}

/// Submits an application for the caller, booking the requested shift.
///
/// The organization check, duplicate check, slot reservation and insert all
/// run in one transaction, so a rejected application never holds a slot. The
/// caller may re-apply once an earlier application was declined or withdrawn.
///
/// # Arguments
/// * `db` - Database connection
/// * `ctx` - Applicant and tenant
/// * `request` - Opportunity, optional shift and message
///
/// # Returns
/// The stored application in `pending` status
///
/// # Errors
/// - [`Error::DuplicateApplication`] if the caller already has a pending or
///   approved application for the opportunity
/// - [`Error::OrganizationInactive`] if the organization is not active
/// - [`Error::CapacityExceeded`] if the shift is full; no application is stored
#[instrument(skip(db, request), fields(opportunity_id = request.opportunity_id))]
pub async fn apply(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    request: ApplicationRequest,
) -> Result<application::Model> {
    let txn = db.begin().await?;

    let opportunity = get_opportunity(&txn, ctx.tenant_id, request.opportunity_id).await?;
    let org = get_organization(&txn, ctx.tenant_id, opportunity.organization_id).await?;
    if org.status != OrganizationStatus::Active.as_str() {
        return Err(Error::OrganizationInactive {
            organization_id: org.id,
        });
    }

    if let Some(shift_id) = request.shift_id {
        let shift = get_shift(&txn, ctx.tenant_id, shift_id).await?;
        if shift.opportunity_id != opportunity.id {
            return Err(Error::Validation {
                message: format!(
                    "Shift {shift_id} does not belong to opportunity {}",
                    opportunity.id
                ),
            });
        }
    }

    let existing = Application::find()
        .filter(application::Column::TenantId.eq(ctx.tenant_id))
        .filter(application::Column::OpportunityId.eq(opportunity.id))
        .filter(application::Column::UserId.eq(ctx.user_id))
        .filter(
            application::Column::Status
                .is_in(ApplicationStatus::ACTIVE.map(ApplicationStatus::as_str)),
        )
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::DuplicateApplication {
            user_id: ctx.user_id,
            opportunity_id: opportunity.id,
        });
    }

    if let Some(shift_id) = request.shift_id {
        reserve(&txn, ctx.tenant_id, shift_id, ctx.user_id).await?;
    }

    let created = application::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        opportunity_id: Set(opportunity.id),
        shift_id: Set(request.shift_id),
        user_id: Set(ctx.user_id),
        status: Set(ApplicationStatus::Pending.as_str().to_string()),
        message: Set(request.message),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        application_id = created.id,
        shift_id = ?created.shift_id,
        "Application submitted"
    );
    Ok(created)
}

/// Finds an application by id within the tenant.
pub async fn get_application<C>(
    db: &C,
    tenant_id: i64,
    application_id: i64,
) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    Application::find_by_id(application_id)
        .filter(application::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "application",
            id: application_id,
        })
}

/// Moves an application to `to` if its status is one of `from`.
async fn transition<C>(
    db: &C,
    ctx: &RequestContext,
    application_id: i64,
    from: &[ApplicationStatus],
    to: ApplicationStatus,
    decided_by: Option<i64>,
) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    let mut update = Application::update_many()
        .col_expr(application::Column::Status, Expr::value(to.as_str()));
    if let Some(actor) = decided_by {
        update = update
            .col_expr(application::Column::DecidedBy, Expr::value(actor))
            .col_expr(
                application::Column::DecidedAt,
                Expr::value(chrono::Utc::now()),
            );
    }

    let result = update
        .filter(application::Column::Id.eq(application_id))
        .filter(application::Column::TenantId.eq(ctx.tenant_id))
        .filter(
            application::Column::Status.is_in(from.iter().copied().map(ApplicationStatus::as_str)),
        )
        .exec(db)
        .await?;

    let application = get_application(db, ctx.tenant_id, application_id).await?;
    if result.rows_affected == 0 {
        debug!(application_id, status = %application.status, "Transition refused");
        return Err(Error::NotPending {
            entity: "application",
            id: application_id,
            status: application.status,
        });
    }
    Ok(application)
}

/// Approves or declines a pending application as an admin of the owning
/// organization.
///
/// The status moves with a conditional update, so two admins deciding at once
/// cannot both succeed. Declining frees the booked shift slot in the same
/// transaction.
///
/// # Arguments
/// * `db` - Database connection
/// * `ctx` - Deciding admin and tenant
/// * `decision` - Application id and outcome
///
/// # Returns
/// The application after the decision, or [`Error::NotPending`] if it was
/// already decided or withdrawn
#[instrument(skip(db))]
pub async fn decide(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    decision: Decision,
) -> Result<application::Model> {
    let txn = db.begin().await?;

    let current = get_application(&txn, ctx.tenant_id, decision.application_id).await?;
    let opportunity = get_opportunity(&txn, ctx.tenant_id, current.opportunity_id).await?;
    require_admin(&txn, ctx, opportunity.organization_id, "decide applications").await?;

    let decided = transition(
        &txn,
        ctx,
        decision.application_id,
        &[ApplicationStatus::Pending],
        decision.status.into(),
        Some(ctx.user_id),
    )
    .await?;

    if decision.status == DecisionStatus::Declined {
        if let Some(shift_id) = decided.shift_id {
            release(&txn, ctx.tenant_id, shift_id).await?;
        }
    }

    txn.commit().await?;
    info!(
        application_id = decided.id,
        status = %decided.status,
        "Application decided"
    );
    Ok(decided)
}

/// Withdraws the caller's own pending or approved application, freeing the
/// booked shift slot.
#[instrument(skip(db))]
pub async fn withdraw(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    application_id: i64,
) -> Result<application::Model> {
    let txn = db.begin().await?;

    let current = get_application(&txn, ctx.tenant_id, application_id).await?;
    if current.user_id != ctx.user_id {
        return Err(Error::Forbidden {
            user_id: ctx.user_id,
            action: format!("withdraw application {application_id}"),
        });
    }

    let withdrawn = transition(
        &txn,
        ctx,
        application_id,
        &ApplicationStatus::ACTIVE,
        ApplicationStatus::Withdrawn,
        None,
    )
    .await?;

    if let Some(shift_id) = withdrawn.shift_id {
        release(&txn, ctx.tenant_id, shift_id).await?;
    }

    txn.commit().await?;
    info!(application_id, "Application withdrawn");
    Ok(withdrawn)
}

/// Applications to an opportunity, oldest first. Admins of the owning
/// organization only.
pub async fn applications_for_opportunity(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    opportunity_id: i64,
) -> Result<Vec<application::Model>> {
    let opportunity = get_opportunity(db, ctx.tenant_id, opportunity_id).await?;
    require_admin(db, ctx, opportunity.organization_id, "list applications").await?;

    Application::find()
        .filter(application::Column::TenantId.eq(ctx.tenant_id))
        .filter(application::Column::OpportunityId.eq(opportunity_id))
        .order_by_asc(application::Column::CreatedAt)
        .order_by_asc(application::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
