//! `timebank-admin` - maintenance entry point.
//!
//! Creates any missing tables and runs a wallet reconciliation sweep. Exits
//! with an error if any wallet disagrees with the ledger.

use dotenvy::dotenv;
use timebank_core::{
    config::{database, policy},
    core::reconcile::reconcile_wallets,
    errors::{Error, Result},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load and validate the deployment policy
    let policy = policy::load_default_policy()
        .inspect_err(|e| error!("Failed to load policy: {}", e))?;
    info!(
        badges = policy.badges.len(),
        retry_attempts = policy.retry.max_attempts,
        "Policy loaded"
    );

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready"))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Reconcile every wallet against the ledger
    let report = reconcile_wallets(&db).await?;
    for mismatch in &report.mismatches {
        warn!(
            wallet_id = mismatch.wallet_id,
            tenant_id = mismatch.tenant_id,
            ledger = %mismatch.ledger,
            cached = %mismatch.cached,
            "Wallet frozen pending review"
        );
    }

    match report.mismatches.first() {
        Some(first) => Err(Error::Integrity {
            wallet_id: first.wallet_id,
            ledger: first.ledger,
            cached: first.cached,
        }),
        None => {
            info!(checked = report.checked, "All wallets reconcile");
            Ok(())
        }
    }
}
