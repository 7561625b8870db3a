//! Hour-log verification.
//!
//! Volunteers self-report hours against an organization; an organization admin
//! is the trust boundary that approves them. Approval flips the log's status,
//! pays the volunteer when the organization has auto-pay enabled, and grants
//! any hour-threshold badges, all in one database transaction: either every
//! effect is committed or none is.

use crate::{
    config::Policy,
    context::RequestContext,
    core::{
        autopay::{pay_for_hour_log, payment_for_hour_log},
        badge::award_threshold_badges,
        credits::{from_hundredths, to_hundredths},
        opportunity::get_opportunity,
        organization::{get_organization, require_admin},
        retry::with_retry,
    },
    entities::{HourLog, badge, hour_log, ledger_entry},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Verification status of an hour log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourLogStatus {
    /// Awaiting review
    Pending,
    /// Verified by an organization admin
    Approved,
    /// Rejected by an organization admin
    Declined,
}

impl HourLogStatus {
    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }
}

/// Payload for logging hours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourLogSubmission {
    /// Organization the hours were given to
    pub organization_id: i64,
    /// Related opportunity, if any
    pub opportunity_id: Option<i64>,
    /// Day worked
    pub date: NaiveDate,
    /// Hours worked, up to two decimal places
    pub hours: Decimal,
    /// What the volunteer did
    pub description: String,
}

/// Outcome of [`approve`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourLogApproval {
    /// The approved log
    pub log: hour_log::Model,
    /// Auto-pay entry, when the organization pays for hours
    pub payment: Option<ledger_entry::Model>,
    /// Badges granted by this approval
    pub badges: Vec<badge::Model>,
    /// False when the log had already been approved and nothing changed
    pub newly_approved: bool,
}

/// Records self-reported hours in `pending` status.
#[instrument(skip(db, submission), fields(organization_id = submission.organization_id))]
pub async fn submit(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    submission: HourLogSubmission,
) -> Result<hour_log::Model> {
    if submission.hours <= Decimal::ZERO {
        return Err(Error::InvalidHours {
            hours: submission.hours,
        });
    }
    let hours = to_hundredths(submission.hours)?;

    let txn = db.begin().await?;
    get_organization(&txn, ctx.tenant_id, submission.organization_id).await?;
    if let Some(opportunity_id) = submission.opportunity_id {
        let opportunity = get_opportunity(&txn, ctx.tenant_id, opportunity_id).await?;
        if opportunity.organization_id != submission.organization_id {
            return Err(Error::Validation {
                message: format!(
                    "Opportunity {opportunity_id} does not belong to organization {}",
                    submission.organization_id
                ),
            });
        }
    }

    let log = hour_log::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        user_id: Set(ctx.user_id),
        organization_id: Set(submission.organization_id),
        opportunity_id: Set(submission.opportunity_id),
        date: Set(submission.date),
        hours_hundredths: Set(hours),
        description: Set(submission.description),
        status: Set(HourLogStatus::Pending.as_str().to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(log_id = log.id, hours = %log.hours(), "Hours logged");
    Ok(log)
}

/// Finds an hour log by id within the tenant.
pub async fn get_hour_log<C>(db: &C, tenant_id: i64, log_id: i64) -> Result<hour_log::Model>
where
    C: ConnectionTrait,
{
    HourLog::find_by_id(log_id)
        .filter(hour_log::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "hour log",
            id: log_id,
        })
}

/// Moves a pending log to `to`, returning the reloaded log and whether this
/// call made the change.
async fn review<C>(
    db: &C,
    ctx: &RequestContext,
    log_id: i64,
    to: HourLogStatus,
) -> Result<(hour_log::Model, bool)>
where
    C: ConnectionTrait,
{
    let result = HourLog::update_many()
        .col_expr(hour_log::Column::Status, Expr::value(to.as_str()))
        .col_expr(hour_log::Column::ReviewedBy, Expr::value(ctx.user_id))
        .col_expr(hour_log::Column::ReviewedAt, Expr::value(chrono::Utc::now()))
        .filter(hour_log::Column::Id.eq(log_id))
        .filter(hour_log::Column::TenantId.eq(ctx.tenant_id))
        .filter(hour_log::Column::Status.eq(HourLogStatus::Pending.as_str()))
        .exec(db)
        .await?;

    let log = get_hour_log(db, ctx.tenant_id, log_id).await?;
    Ok((log, result.rows_affected == 1))
}

async fn approve_once(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    policy: &Policy,
    log_id: i64,
) -> Result<HourLogApproval> {
    let txn = db.begin().await?;

    let log = get_hour_log(&txn, ctx.tenant_id, log_id).await?;
    let org = get_organization(&txn, ctx.tenant_id, log.organization_id).await?;
    require_admin(&txn, ctx, org.id, "approve hours").await?;

    let (log, changed) = review(&txn, ctx, log_id, HourLogStatus::Approved).await?;
    if !changed {
        if log.status != HourLogStatus::Approved.as_str() {
            return Err(Error::NotPending {
                entity: "hour log",
                id: log_id,
                status: log.status,
            });
        }

        let payment = payment_for_hour_log(&txn, ctx.tenant_id, log_id).await?;
        txn.commit().await?;
        info!(log_id, "Hour log already approved");
        return Ok(HourLogApproval {
            log,
            payment,
            badges: Vec::new(),
            newly_approved: false,
        });
    }

    let payment = if org.auto_pay_enabled {
        Some(pay_for_hour_log(&txn, &policy.ledger, &log, ctx.user_id).await?)
    } else {
        None
    };

    let total = total_verified_hours(&txn, ctx.tenant_id, log.user_id).await?;
    let badges =
        award_threshold_badges(&txn, ctx.tenant_id, log.user_id, total, &policy.badges).await?;

    txn.commit().await?;
    info!(
        log_id,
        user_id = log.user_id,
        hours = %log.hours(),
        paid = payment.is_some(),
        "Hour log approved"
    );

    Ok(HourLogApproval {
        log,
        payment,
        badges,
        newly_approved: true,
    })
}

/// Approves a pending hour log as an admin of its organization.
///
/// Approving an already-approved log changes nothing and returns the existing
/// payment; approving a declined log fails with [`Error::NotPending`].
/// The status change, auto-pay entry and badge grants commit together. A
/// failed payment leaves the log pending. Transient contention is retried per
/// `policy.retry`.
///
/// # Arguments
/// * `db` - Database connection
/// * `ctx` - Reviewing admin and tenant
/// * `policy` - Overdraft, badge and retry settings
/// * `log_id` - Hour log to approve
///
/// # Returns
/// An [`HourLogApproval`] with the log, its payment if any and new badges
#[instrument(skip(db, policy))]
pub async fn approve(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    policy: &Policy,
    log_id: i64,
) -> Result<HourLogApproval> {
    with_retry(&policy.retry, "hour_log.approve", move || {
        approve_once(db, ctx, policy, log_id)
    })
    .await
}

/// Declines a pending hour log as an admin of its organization.
#[instrument(skip(db))]
pub async fn decline(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    log_id: i64,
) -> Result<hour_log::Model> {
    let txn = db.begin().await?;

    let log = get_hour_log(&txn, ctx.tenant_id, log_id).await?;
    require_admin(&txn, ctx, log.organization_id, "decline hours").await?;

    let (log, changed) = review(&txn, ctx, log_id, HourLogStatus::Declined).await?;
    if !changed {
        return Err(Error::NotPending {
            entity: "hour log",
            id: log_id,
            status: log.status,
        });
    }

    txn.commit().await?;
    info!(log_id, "Hour log declined");
    Ok(log)
}

/// Sum of approved hours for a user. Pending and declined logs never count.
pub async fn total_verified_hours<C>(db: &C, tenant_id: i64, user_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let total: Option<Option<i64>> = HourLog::find()
        .select_only()
        .column_as(Expr::col(hour_log::Column::HoursHundredths).sum(), "total")
        .filter(hour_log::Column::TenantId.eq(tenant_id))
        .filter(hour_log::Column::UserId.eq(user_id))
        .filter(hour_log::Column::Status.eq(HourLogStatus::Approved.as_str()))
        .into_tuple()
        .one(db)
        .await?;
    Ok(from_hundredths(total.flatten().unwrap_or(0)))
}

/// Approved logs of a user, most recent day first. Read-only feed for
/// certificates.
pub async fn approved_hour_logs(
    db: &DatabaseConnection,
    tenant_id: i64,
    user_id: i64,
) -> Result<Vec<hour_log::Model>> {
    HourLog::find()
        .filter(hour_log::Column::TenantId.eq(tenant_id))
        .filter(hour_log::Column::UserId.eq(user_id))
        .filter(hour_log::Column::Status.eq(HourLogStatus::Approved.as_str()))
        .order_by_desc(hour_log::Column::Date)
        .order_by_desc(hour_log::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Logs submitted to an organization, optionally filtered by status, oldest first.
pub async fn hour_logs_for_organization(
    db: &DatabaseConnection,
    tenant_id: i64,
    organization_id: i64,
    status: Option<HourLogStatus>,
) -> Result<Vec<hour_log::Model>> {
    let mut query = HourLog::find()
        .filter(hour_log::Column::TenantId.eq(tenant_id))
        .filter(hour_log::Column::OrganizationId.eq(organization_id));
    if let Some(status) = status {
        query = query.filter(hour_log::Column::Status.eq(status.as_str()));
    }

    query
        .order_by_asc(hour_log::Column::CreatedAt)
        .order_by_asc(hour_log::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::BadgeRule;
    use crate::core::ledger::{WalletOwner, balance};
    use crate::core::opportunity::{NewOpportunity, create_opportunity};
    use crate::entities::{LedgerEntry, ledger_entry};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn submission(organization_id: i64, hours: Decimal) -> HourLogSubmission {
        HourLogSubmission {
            organization_id,
            opportunity_id: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            hours,
            description: "Sorted donations".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_non_positive_hours() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = submit(&db, &test_ctx(VOLUNTEER), submission(1, Decimal::ZERO)).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidHours { .. }));

        let result = submit(&db, &test_ctx(VOLUNTEER), submission(1, Decimal::from(-2))).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidHours { hours } if hours == Decimal::from(-2)
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_submit_checks_organization_and_opportunity() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let other_org = create_test_organization(&db, true).await?;
        let other_opp = create_opportunity(
            &db,
            &test_ctx(ADMIN),
            NewOpportunity {
                organization_id: other_org.id,
                title: "Elsewhere".to_string(),
                ..NewOpportunity::default()
            },
        )
        .await?;

        let result = submit(&db, &test_ctx(VOLUNTEER), submission(9999, Decimal::ONE)).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        let mut mismatched = submission(org.id, Decimal::ONE);
        mismatched.opportunity_id = Some(other_opp.id);
        let result = submit(&db, &test_ctx(VOLUNTEER), mismatched).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let log = submit(&db, &test_ctx(VOLUNTEER), submission(org.id, Decimal::new(275, 2)))
            .await?;
        assert_eq!(log.status, "pending");
        assert_eq!(log.user_id, VOLUNTEER);
        assert_eq!(log.hours(), Decimal::new(275, 2));

        Ok(())
    }

    #[tokio::test]
    async fn test_approve_with_auto_pay() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::new(300, 2)).await?;

        let approval = approve(&db, &test_ctx(ADMIN), &Policy::default(), log.id).await?;
        assert!(approval.newly_approved);
        assert_eq!(approval.log.status, "approved");
        assert_eq!(approval.log.reviewed_by, Some(ADMIN));

        let payment = approval.payment.unwrap();
        assert_eq!(payment.amount(), Decimal::from(3));
        assert_eq!(payment.reference, format!("hour-log:{}", log.id));

        assert_eq!(LedgerEntry::find().count(&db).await?, 1);
        assert_eq!(
            balance(&db, TENANT, WalletOwner::Member(VOLUNTEER)).await?,
            Decimal::from(3)
        );
        assert_eq!(
            balance(&db, TENANT, WalletOwner::Organization(org.id)).await?,
            Decimal::from(-3)
        );
        assert_eq!(
            total_verified_hours(&db, TENANT, VOLUNTEER).await?,
            Decimal::from(3)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_approve_without_auto_pay() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, false).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::new(300, 2)).await?;

        let approval = approve(&db, &test_ctx(ADMIN), &Policy::default(), log.id).await?;
        assert_eq!(approval.log.status, "approved");
        assert!(approval.payment.is_none());

        assert_eq!(LedgerEntry::find().count(&db).await?, 0);
        assert_eq!(
            total_verified_hours(&db, TENANT, VOLUNTEER).await?,
            Decimal::from(3)
        );
        assert_eq!(
            balance(&db, TENANT, WalletOwner::Member(VOLUNTEER)).await?,
            Decimal::ZERO
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_approve_twice_posts_once() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::from(2)).await?;
        let policy = Policy::default();

        let first = approve(&db, &test_ctx(ADMIN), &policy, log.id).await?;
        let second = approve(&db, &test_ctx(ADMIN), &policy, log.id).await?;

        assert!(first.newly_approved);
        assert!(!second.newly_approved);
        assert_eq!(first.payment, second.payment);

        let entries = LedgerEntry::find()
            .filter(ledger_entry::Column::Reference.eq(format!("hour-log:{}", log.id)))
            .count(&db)
            .await?;
        assert_eq!(entries, 1);
        assert_eq!(
            balance(&db, TENANT, WalletOwner::Member(VOLUNTEER)).await?,
            Decimal::from(2)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_approve_requires_admin_and_tenant() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::ONE).await?;
        let policy = Policy::default();

        // Volunteers cannot approve their own hours
        let result = approve(&db, &test_ctx(VOLUNTEER), &policy, log.id).await;
        assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));

        let result = approve(&db, &RequestContext::new(OTHER_TENANT, ADMIN), &policy, log.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        assert_eq!(get_hour_log(&db, TENANT, log.id).await?.status, "pending");
        assert_eq!(LedgerEntry::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_decline_then_approve_is_not_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::ONE).await?;

        let declined = decline(&db, &test_ctx(ADMIN), log.id).await?;
        assert_eq!(declined.status, "declined");

        let result = approve(&db, &test_ctx(ADMIN), &Policy::default(), log.id).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotPending { ref status, .. } if status == "declined"
        ));

        let result = decline(&db, &test_ctx(ADMIN), log.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotPending { .. }));

        assert_eq!(total_verified_hours(&db, TENANT, VOLUNTEER).await?, Decimal::ZERO);
        assert_eq!(LedgerEntry::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_payment_rolls_back_approval() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::ONE).await?;

        // Organizations may not issue unbacked credit under this policy
        let mut policy = Policy::default();
        policy.ledger.organization_overdraft = false;

        let result = approve(&db, &test_ctx(ADMIN), &policy, log.id).await;
        assert!(matches!(result.unwrap_err(), Error::InsufficientCredits { .. }));

        let stored = get_hour_log(&db, TENANT, log.id).await?;
        assert_eq!(stored.status, "pending");
        assert_eq!(total_verified_hours(&db, TENANT, VOLUNTEER).await?, Decimal::ZERO);
        assert_eq!(LedgerEntry::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_total_verified_hours_ignores_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, false).await?;
        let policy = Policy::default();

        let a = create_test_hour_log(&db, org.id, Decimal::new(150, 2)).await?;
        let b = create_test_hour_log(&db, org.id, Decimal::new(225, 2)).await?;
        create_test_hour_log(&db, org.id, Decimal::from(8)).await?;

        approve(&db, &test_ctx(ADMIN), &policy, a.id).await?;
        approve(&db, &test_ctx(ADMIN), &policy, b.id).await?;

        assert_eq!(
            total_verified_hours(&db, TENANT, VOLUNTEER).await?,
            Decimal::new(375, 2)
        );
        assert_eq!(approved_hour_logs(&db, TENANT, VOLUNTEER).await?.len(), 2);
        assert_eq!(
            hour_logs_for_organization(&db, TENANT, org.id, Some(HourLogStatus::Pending))
                .await?
                .len(),
            1
        );
        assert_eq!(
            hour_logs_for_organization(&db, TENANT, org.id, None).await?.len(),
            3
        );
        assert_eq!(
            total_verified_hours(&db, OTHER_TENANT, VOLUNTEER).await?,
            Decimal::ZERO
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_approval_awards_threshold_badges() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, false).await?;
        let policy = Policy {
            badges: vec![BadgeRule {
                name: "Five Hours".to_string(),
                icon: "star".to_string(),
                hours: Decimal::from(5),
            }],
            ..Policy::default()
        };

        let a = create_test_hour_log(&db, org.id, Decimal::from(3)).await?;
        let b = create_test_hour_log(&db, org.id, Decimal::from(2)).await?;

        let first = approve(&db, &test_ctx(ADMIN), &policy, a.id).await?;
        assert!(first.badges.is_empty());

        let second = approve(&db, &test_ctx(ADMIN), &policy, b.id).await?;
        assert_eq!(second.badges.len(), 1);
        assert_eq!(second.badges[0].name, "Five Hours");

        Ok(())
    }

    #[tokio::test]
    async fn test_approval_with_rules_sharing_a_badge_name() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let star = |hours: i64| BadgeRule {
            name: "Star".to_string(),
            icon: "star".to_string(),
            hours: Decimal::from(hours),
        };
        let policy = Policy {
            badges: vec![star(1), star(2)],
            ..Policy::default()
        };

        let log = create_test_hour_log(&db, org.id, Decimal::from(3)).await?;
        let approval = approve(&db, &test_ctx(ADMIN), &policy, log.id).await?;

        assert_eq!(approval.log.status, "approved");
        assert_eq!(approval.badges.len(), 1);
        assert!(approval.payment.is_some());

        Ok(())
    }
}
