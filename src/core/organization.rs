//! Organization business logic - registration, status and the admin set.
//!
//! Every organization has at least one owner, recorded in `organization_admins`
//! at registration time. Admin membership is the authorization check used by
//! the application and hour-log workflows. Activation sits outside that set:
//! only a platform operator named in the policy may change an organization's
//! status.

use crate::{
    config::Policy,
    context::RequestContext,
    entities::{Organization, OrganizationAdmin, organization, organization_admin},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Lifecycle status of an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    /// Accepting volunteers
    Active,
    /// Awaiting activation
    Pending,
}

impl OrganizationStatus {
    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }
}

/// Role within an organization's admin set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Registered the organization
    Owner,
    /// Granted by an existing admin
    Admin,
}

impl AdminRole {
    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }
}

/// Registers a new organization in `pending` status with the caller as owner.
#[instrument(skip(db))]
pub async fn register_organization(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    name: String,
    auto_pay_enabled: bool,
) -> Result<organization::Model> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Organization name cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;
    let now = chrono::Utc::now();

    let org = organization::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        name: Set(name.trim().to_string()),
        status: Set(OrganizationStatus::Pending.as_str().to_string()),
        auto_pay_enabled: Set(auto_pay_enabled),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    organization_admin::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        organization_id: Set(org.id),
        user_id: Set(ctx.user_id),
        role: Set(AdminRole::Owner.as_str().to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(organization_id = org.id, "Organization registered");
    Ok(org)
}

/// Finds an organization by id within the tenant.
pub async fn get_organization<C>(
    db: &C,
    tenant_id: i64,
    organization_id: i64,
) -> Result<organization::Model>
where
    C: ConnectionTrait,
{
    Organization::find_by_id(organization_id)
        .filter(organization::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "organization",
            id: organization_id,
        })
}

/// Whether `user_id` is in the organization's owner/admin set.
pub async fn is_admin_of<C>(
    db: &C,
    tenant_id: i64,
    organization_id: i64,
    user_id: i64,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = OrganizationAdmin::find()
        .filter(organization_admin::Column::TenantId.eq(tenant_id))
        .filter(organization_admin::Column::OrganizationId.eq(organization_id))
        .filter(organization_admin::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Fails with [`Error::Forbidden`] unless the caller administers the organization.
pub(crate) async fn require_admin<C>(
    db: &C,
    ctx: &RequestContext,
    organization_id: i64,
    action: &str,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if is_admin_of(db, ctx.tenant_id, organization_id, ctx.user_id).await? {
        Ok(())
    } else {
        Err(Error::Forbidden {
            user_id: ctx.user_id,
            action: format!("{action} for organization {organization_id}"),
        })
    }
}

/// Grants `user_id` the admin role. Granting an existing admin is a no-op.
#[instrument(skip(db))]
pub async fn add_admin(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    organization_id: i64,
    user_id: i64,
) -> Result<organization_admin::Model> {
    let txn = db.begin().await?;
    get_organization(&txn, ctx.tenant_id, organization_id).await?;
    require_admin(&txn, ctx, organization_id, "add administrators").await?;

    let existing = OrganizationAdmin::find()
        .filter(organization_admin::Column::TenantId.eq(ctx.tenant_id))
        .filter(organization_admin::Column::OrganizationId.eq(organization_id))
        .filter(organization_admin::Column::UserId.eq(user_id))
        .one(&txn)
        .await?;
    if let Some(admin) = existing {
        return Ok(admin);
    }

    let admin = organization_admin::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        organization_id: Set(organization_id),
        user_id: Set(user_id),
        role: Set(AdminRole::Admin.as_str().to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(organization_id, user_id, "Administrator added");
    Ok(admin)
}

/// Moves the organization between `pending` and `active`.
///
/// Registration leaves an organization `pending`, which blocks applications
/// to its opportunities. Flipping the status is reserved for platform
/// operators; organization owners and admins are refused.
///
/// # Arguments
/// * `db` - Database connection
/// * `ctx` - Acting operator and tenant
/// * `policy` - Deployment policy naming the operators
/// * `organization_id` - Organization to update
/// * `status` - New status
///
/// # Returns
/// The updated organization, or `Forbidden` when the caller is not an operator
#[instrument(skip(db, policy))]
pub async fn set_organization_status(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    policy: &Policy,
    organization_id: i64,
    status: OrganizationStatus,
) -> Result<organization::Model> {
    if !policy.platform.is_operator(ctx.user_id) {
        return Err(Error::Forbidden {
            user_id: ctx.user_id,
            action: format!("change status of organization {organization_id}"),
        });
    }

    let txn = db.begin().await?;
    let org = get_organization(&txn, ctx.tenant_id, organization_id).await?;

    let mut active: organization::ActiveModel = org.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(organization_id, status = status.as_str(), "Organization status changed");
    Ok(updated)
}
