//! Wallet reconciliation sweep.
//!
//! Recomputes every wallet's balance from the ledger and compares it with the
//! materialized `balance_hundredths`. Wallets that disagree are frozen and
//! reported; they stay frozen until someone reviews them by hand. The time of
//! the last completed sweep is kept in `system_state`.

use crate::{
    core::ledger::verify_wallet,
    entities::{SystemState, Wallet, system_state, wallet},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{info, instrument, warn};

const LAST_RECONCILIATION_KEY: &str = "last_wallet_reconciliation";

/// A wallet whose cached balance disagrees with its ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletMismatch {
    /// Wallet id
    pub wallet_id: i64,
    /// Tenant the wallet belongs to
    pub tenant_id: i64,
    /// Balance derived from ledger entries
    pub ledger: Decimal,
    /// Materialized balance
    pub cached: Decimal,
}

/// Outcome of a reconciliation sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    /// Wallets examined
    pub checked: usize,
    /// Wallets that were already frozen before the sweep
    pub already_frozen: usize,
    /// Wallets whose cache disagrees with the ledger, all frozen
    pub mismatches: Vec<WalletMismatch>,
}

impl ReconciliationReport {
    /// Every wallet matched its ledger
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Checks every wallet in every tenant against the ledger.
///
/// Each wallet is re-read together with its ledger sum in its own
/// transaction, so postings committed while the sweep runs are never mistaken
/// for corruption. Mismatching wallets are frozen and listed in the report;
/// the sweep itself only fails on storage errors.
#[instrument(skip(db))]
pub async fn reconcile_wallets(db: &DatabaseConnection) -> Result<ReconciliationReport> {
    let wallets = Wallet::find()
        .order_by_asc(wallet::Column::Id)
        .all(db)
        .await?;

    let mut report = ReconciliationReport::default();
    for wallet in wallets {
        report.checked += 1;
        if wallet.is_frozen {
            report.already_frozen += 1;
        }

        match verify_wallet(db, wallet.id).await {
            Ok(_) => {}
            Err(Error::Integrity {
                wallet_id,
                ledger,
                cached,
            }) => report.mismatches.push(WalletMismatch {
                wallet_id,
                tenant_id: wallet.tenant_id,
                ledger,
                cached,
            }),
            Err(e) => return Err(e),
        }
    }

    set_last_reconciliation(db, Utc::now()).await?;

    if report.is_clean() {
        info!(checked = report.checked, "Wallet reconciliation clean");
    } else {
        warn!(
            checked = report.checked,
            mismatches = report.mismatches.len(),
            "Wallet reconciliation found inconsistent wallets"
        );
    }
    Ok(report)
}

/// When the last sweep completed, if one ever has.
pub async fn last_reconciliation(db: &DatabaseConnection) -> Result<Option<DateTime<Utc>>> {
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_RECONCILIATION_KEY))
        .one(db)
        .await?;

    state
        .map(|s| {
            DateTime::parse_from_rfc3339(&s.value)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| Error::Config {
                    message: format!("Failed to parse last reconciliation time: {e}"),
                })
        })
        .transpose()
}

async fn set_last_reconciliation<C>(db: &C, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let value = at.to_rfc3339();
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_RECONCILIATION_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_RECONCILIATION_KEY.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
