//! Auto-pay policy engine.
//!
//! When an organization opts in, approving an hour log pays the volunteer one
//! time credit per approved hour, debited from the organization's wallet. The
//! posting reuses the ledger's reference idempotency: each hour log maps to the
//! single reference `hour-log:<id>`.

use crate::{
    config::LedgerPolicy,
    context::RequestContext,
    core::{
        ledger::{Transfer, WalletOwner, find_by_reference, post_in},
        organization::{get_organization, require_admin},
    },
    entities::{hour_log, ledger_entry, organization},
    errors::Result,
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Ledger reference used for the auto-pay of an hour log.
#[must_use]
pub fn hour_log_reference(log_id: i64) -> String {
    format!("hour-log:{log_id}")
}

/// Posts the organization → member payment for an approved hour log.
///
/// Runs inside the approval transaction; a repeat call returns the entry
/// already posted for the log.
pub async fn pay_for_hour_log<C>(
    db: &C,
    policy: &LedgerPolicy,
    log: &hour_log::Model,
    actor: i64,
) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    let transfer = Transfer {
        from: WalletOwner::Organization(log.organization_id),
        to: WalletOwner::Member(log.user_id),
        amount: log.hours(),
        reference: hour_log_reference(log.id),
        description: format!("Auto-pay: {} hours on {}", log.hours(), log.date),
    };
    post_in(db, log.tenant_id, actor, policy, &transfer).await
}

/// The payment posted for an hour log, if any.
pub async fn payment_for_hour_log<C>(
    db: &C,
    tenant_id: i64,
    log_id: i64,
) -> Result<Option<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    find_by_reference(db, tenant_id, &hour_log_reference(log_id)).await
}

/// Turns auto-pay on or off for an organization the caller administers.
#[instrument(skip(db))]
pub async fn set_auto_pay(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    organization_id: i64,
    enabled: bool,
) -> Result<organization::Model> {
    let txn = db.begin().await?;
    let org = get_organization(&txn, ctx.tenant_id, organization_id).await?;
    require_admin(&txn, ctx, organization_id, "change auto-pay").await?;

    let mut active: organization::ActiveModel = org.into();
    active.auto_pay_enabled = Set(enabled);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(organization_id, enabled, "Auto-pay setting changed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::balance;
    use crate::errors::Error;
    use crate::test_utils::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_hour_log_reference_format() {
        assert_eq!(hour_log_reference(42), "hour-log:42");
    }

    #[tokio::test]
    async fn test_set_auto_pay() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, false).await?;

        let updated = set_auto_pay(&db, &test_ctx(ADMIN), org.id, true).await?;
        assert!(updated.auto_pay_enabled);

        let result = set_auto_pay(&db, &test_ctx(VOLUNTEER), org.id, false).await;
        assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_pay_for_hour_log_posts_once() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let log = create_test_hour_log(&db, org.id, Decimal::new(150, 2)).await?;
        let policy = LedgerPolicy::default();

        let txn = db.begin().await?;
        let first = pay_for_hour_log(&txn, &policy, &log, ADMIN).await?;
        let second = pay_for_hour_log(&txn, &policy, &log, ADMIN).await?;
        txn.commit().await?;

        assert_eq!(first, second);
        assert_eq!(first.reference, format!("hour-log:{}", log.id));
        assert_eq!(
            payment_for_hour_log(&db, TENANT, log.id).await?,
            Some(first)
        );
        assert_eq!(
            balance(&db, TENANT, WalletOwner::Member(VOLUNTEER)).await?,
            Decimal::new(150, 2)
        );

        Ok(())
    }
}
