//! Time-credit ledger and wallet projection.
//!
//! The ledger is append-only: entries are inserted and never updated or deleted.
//! Each wallet row carries a materialized balance that is adjusted in the same
//! transaction as the entry insert, using atomic `balance = balance ± amount`
//! updates. [`balance`] recomputes the balance from the entries and treats any
//! disagreement with the cache as corruption: the wallet is frozen and
//! [`Error::Integrity`] is returned. Frozen wallets accept no further postings.
//!
//! A posting's `reference` is unique per tenant. Posting an existing reference
//! again is a no-op that returns the original entry, which makes retries and
//! repeated approvals safe.

use crate::{
    config::{LedgerPolicy, Policy},
    context::RequestContext,
    core::{
        credits::{from_hundredths, to_hundredths},
        retry::with_retry,
    },
    entities::{LedgerEntry, Wallet, ledger_entry, wallet},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{
    Condition, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func, OnConflict, SimpleExpr},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// Owner of a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WalletOwner {
    /// A volunteer or timebank member
    Member(i64),
    /// An organization (credit issuer)
    Organization(i64),
    /// The tenant-wide community pool
    CommunityPool,
}

impl WalletOwner {
    /// Stored `owner_kind`
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Member(_) => "member",
            Self::Organization(_) => "organization",
            Self::CommunityPool => "community_pool",
        }
    }

    /// Stored `owner_id`; the community pool uses 0
    #[must_use]
    pub const fn owner_id(self) -> i64 {
        match self {
            Self::Member(id) | Self::Organization(id) => id,
            Self::CommunityPool => 0,
        }
    }

    /// Whether the deployment lets this wallet kind go negative
    #[must_use]
    pub const fn allows_overdraft(self, policy: &LedgerPolicy) -> bool {
        match self {
            Self::Member(_) => policy.member_overdraft,
            Self::Organization(_) => policy.organization_overdraft,
            Self::CommunityPool => policy.pool_overdraft,
        }
    }

    /// Rebuilds the owner from a stored wallet row.
    pub fn from_wallet(model: &wallet::Model) -> Result<Self> {
        match model.owner_kind.as_str() {
            "member" => Ok(Self::Member(model.owner_id)),
            "organization" => Ok(Self::Organization(model.owner_id)),
            "community_pool" => Ok(Self::CommunityPool),
            other => Err(Error::Validation {
                message: format!("Unknown wallet kind '{other}' on wallet {}", model.id),
            }),
        }
    }
}

/// A requested movement of credits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Wallet debited
    pub from: WalletOwner,
    /// Wallet credited
    pub to: WalletOwner,
    /// Credits moved; must be positive
    pub amount: Decimal,
    /// Idempotency key, unique per tenant
    pub reference: String,
    /// Human-readable description
    pub description: String,
}

/// Checks the transfer shape and returns the amount in hundredths.
fn validate_transfer(transfer: &Transfer) -> Result<i64> {
    if transfer.amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount {
            amount: transfer.amount,
        });
    }
    let amount = to_hundredths(transfer.amount)?;
    if amount == 0 {
        return Err(Error::NonPositiveAmount {
            amount: transfer.amount,
        });
    }
    if transfer.from == transfer.to {
        return Err(Error::Validation {
            message: "Cannot transfer credits from a wallet to itself".to_string(),
        });
    }
    if transfer.reference.trim().is_empty() {
        return Err(Error::Validation {
            message: "Ledger reference cannot be empty".to_string(),
        });
    }
    Ok(amount)
}

/// Finds the wallet of `owner`, if it has ever been touched.
pub async fn find_wallet<C>(
    db: &C,
    tenant_id: i64,
    owner: WalletOwner,
) -> Result<Option<wallet::Model>>
where
    C: ConnectionTrait,
{
    Wallet::find()
        .filter(wallet::Column::TenantId.eq(tenant_id))
        .filter(wallet::Column::OwnerKind.eq(owner.kind()))
        .filter(wallet::Column::OwnerId.eq(owner.owner_id()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the wallet of `owner`, creating an empty one on first use.
async fn get_or_create_wallet<C>(db: &C, tenant_id: i64, owner: WalletOwner) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_wallet(db, tenant_id, owner).await? {
        return Ok(existing);
    }

    let new_wallet = wallet::ActiveModel {
        tenant_id: Set(tenant_id),
        owner_kind: Set(owner.kind().to_string()),
        owner_id: Set(owner.owner_id()),
        balance_hundredths: Set(0),
        is_frozen: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Wallet::insert(new_wallet)
        .on_conflict(
            OnConflict::columns([
                wallet::Column::TenantId,
                wallet::Column::OwnerKind,
                wallet::Column::OwnerId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    find_wallet(db, tenant_id, owner)
        .await?
        .ok_or_else(|| Error::Database(DbErr::RecordNotFound(format!("{owner:?} wallet"))))
}

/// Looks up the entry posted under `reference`.
pub async fn find_by_reference<C>(
    db: &C,
    tenant_id: i64,
    reference: &str,
) -> Result<Option<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    LedgerEntry::find()
        .filter(ledger_entry::Column::TenantId.eq(tenant_id))
        .filter(ledger_entry::Column::Reference.eq(reference))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn debit<C>(db: &C, wallet: &wallet::Model, amount: i64, overdraft: bool) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = Wallet::update_many()
        .col_expr(
            wallet::Column::BalanceHundredths,
            Expr::col(wallet::Column::BalanceHundredths).sub(amount),
        )
        .filter(wallet::Column::Id.eq(wallet.id))
        .filter(wallet::Column::IsFrozen.eq(false));
    if !overdraft {
        update = update.filter(wallet::Column::BalanceHundredths.gte(amount));
    }

    if update.exec(db).await?.rows_affected == 1 {
        return Ok(());
    }

    let current = Wallet::find_by_id(wallet.id).one(db).await?.ok_or(Error::NotFound {
        entity: "wallet",
        id: wallet.id,
    })?;
    if current.is_frozen {
        Err(Error::WalletFrozen {
            wallet_id: wallet.id,
        })
    } else {
        Err(Error::InsufficientCredits {
            wallet_id: wallet.id,
            balance: current.balance(),
            required: from_hundredths(amount),
        })
    }
}

async fn credit<C>(db: &C, wallet: &wallet::Model, amount: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Wallet::update_many()
        .col_expr(
            wallet::Column::BalanceHundredths,
            Expr::col(wallet::Column::BalanceHundredths).add(amount),
        )
        .filter(wallet::Column::Id.eq(wallet.id))
        .filter(wallet::Column::IsFrozen.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        Ok(())
    } else {
        Err(Error::WalletFrozen {
            wallet_id: wallet.id,
        })
    }
}

/// Posts a transfer within an existing transaction.
///
/// Returns the existing entry unchanged if `transfer.reference` was already
/// posted in this tenant. On any error the caller must roll back.
pub async fn post_in<C>(
    db: &C,
    tenant_id: i64,
    actor: i64,
    policy: &LedgerPolicy,
    transfer: &Transfer,
) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    let amount = validate_transfer(transfer)?;

    if let Some(existing) = find_by_reference(db, tenant_id, &transfer.reference).await? {
        debug!(
            reference = %transfer.reference,
            entry_id = existing.id,
            "Reference already posted"
        );
        return Ok(existing);
    }

    let from_wallet = get_or_create_wallet(db, tenant_id, transfer.from).await?;
    let to_wallet = get_or_create_wallet(db, tenant_id, transfer.to).await?;
    for w in [&from_wallet, &to_wallet] {
        if w.is_frozen {
            return Err(Error::WalletFrozen { wallet_id: w.id });
        }
    }

    // Claim the reference first; a concurrent poster of the same reference
    // either already won (no row inserted) or will find ours.
    let claimed = LedgerEntry::insert(ledger_entry::ActiveModel {
        tenant_id: Set(tenant_id),
        from_wallet_id: Set(from_wallet.id),
        to_wallet_id: Set(to_wallet.id),
        amount_hundredths: Set(amount),
        reference: Set(transfer.reference.clone()),
        description: Set(transfer.description.clone()),
        created_by: Set(actor),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            ledger_entry::Column::TenantId,
            ledger_entry::Column::Reference,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let entry = find_by_reference(db, tenant_id, &transfer.reference)
        .await?
        .ok_or_else(|| Error::Database(DbErr::RecordNotFound(transfer.reference.clone())))?;
    if claimed == 0 {
        debug!(reference = %transfer.reference, "Reference claimed concurrently");
        return Ok(entry);
    }

    debit(
        db,
        &from_wallet,
        amount,
        transfer.from.allows_overdraft(policy),
    )
    .await?;
    credit(db, &to_wallet, amount).await?;

    info!(
        entry_id = entry.id,
        reference = %entry.reference,
        from = from_wallet.id,
        to = to_wallet.id,
        amount = %transfer.amount,
        "Ledger entry posted"
    );
    Ok(entry)
}

/// Posts a transfer in its own transaction, retrying transient contention.
///
/// Posting is idempotent on `transfer.reference`: replaying a reference returns
/// the original entry without moving credits again. Both wallets' cached
/// balances change in the same transaction as the entry insert.
///
/// # Arguments
/// * `db` - Database connection
/// * `ctx` - Acting user and tenant
/// * `policy` - Overdraft and retry settings
/// * `transfer` - Wallets, amount and idempotency reference
///
/// # Returns
/// The ledger entry for `transfer.reference`
///
/// # Errors
/// - [`Error::NonPositiveAmount`] for a zero or negative amount
/// - [`Error::InsufficientCredits`] if the source wallet may not overdraw
/// - [`Error::WalletFrozen`] if either wallet is frozen
#[instrument(skip(db, policy, transfer), fields(reference = %transfer.reference))]
pub async fn post(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    policy: &Policy,
    transfer: Transfer,
) -> Result<ledger_entry::Model> {
    validate_transfer(&transfer)?;
    let transfer = &transfer;

    with_retry(&policy.retry, "ledger.post", move || async move {
        let txn = db.begin().await?;
        let entry = post_in(&txn, ctx.tenant_id, ctx.user_id, &policy.ledger, transfer).await?;
        txn.commit().await?;
        Ok(entry)
    })
    .await
}

/// Incoming minus outgoing entries for a wallet, in hundredths.
///
/// Computed by one aggregate statement,
/// `SUM(CASE WHEN to = w THEN amount WHEN from = w THEN -amount END)`, so both
/// directions come from the same read.
pub async fn ledger_sum<C>(db: &C, wallet_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let signed = Expr::case(
        Expr::col(ledger_entry::Column::ToWalletId).eq(wallet_id),
        Expr::col(ledger_entry::Column::AmountHundredths),
    )
    .case(
        Expr::col(ledger_entry::Column::FromWalletId).eq(wallet_id),
        Expr::col(ledger_entry::Column::AmountHundredths).mul(-1_i64),
    )
    .finally(Expr::value(0_i64));

    let total: Option<Option<i64>> = LedgerEntry::find()
        .select_only()
        .column_as(SimpleExpr::from(Func::sum(signed)), "net")
        .filter(
            Condition::any()
                .add(ledger_entry::Column::ToWalletId.eq(wallet_id))
                .add(ledger_entry::Column::FromWalletId.eq(wallet_id)),
        )
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Marks a wallet as frozen pending manual review.
pub(crate) async fn freeze_wallet<C>(db: &C, wallet_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    Wallet::update_many()
        .col_expr(wallet::Column::IsFrozen, Expr::value(true))
        .filter(wallet::Column::Id.eq(wallet_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Compares a wallet's cache with its ledger sum, freezing it on mismatch.
///
/// The wallet row and the ledger sum are read inside one transaction, so a
/// posting that commits concurrently is either fully visible or not at all.
/// Only a real disagreement within that snapshot freezes the wallet.
pub(crate) async fn verify_wallet(db: &DatabaseConnection, wallet_id: i64) -> Result<Decimal> {
    let txn = db.begin().await?;

    let wallet = Wallet::find_by_id(wallet_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "wallet",
            id: wallet_id,
        })?;
    let ledger = ledger_sum(&txn, wallet.id).await?;

    if ledger != wallet.balance_hundredths {
        error!(
            wallet_id = wallet.id,
            ledger,
            cached = wallet.balance_hundredths,
            "Wallet balance does not reconcile with ledger; freezing"
        );
        freeze_wallet(&txn, wallet.id).await?;
        txn.commit().await?;
        return Err(Error::Integrity {
            wallet_id: wallet.id,
            ledger: from_hundredths(ledger),
            cached: wallet.balance(),
        });
    }

    txn.commit().await?;
    Ok(from_hundredths(ledger))
}

/// Balance of `owner`'s wallet, derived from the ledger and checked against
/// the materialized cache. Wallets that were never touched have balance zero.
///
/// # Returns
/// * `Ok(balance)` - Ledger and cache agree
/// * `Err(Error::Integrity)` - They disagree; the wallet is now frozen and
///   rejects further postings until reviewed
pub async fn balance(db: &DatabaseConnection, tenant_id: i64, owner: WalletOwner) -> Result<Decimal> {
    match find_wallet(db, tenant_id, owner).await? {
        Some(wallet) => verify_wallet(db, wallet.id).await,
        None => Ok(Decimal::ZERO),
    }
}

/// Ledger history of `owner`'s wallet, newest first.
pub async fn entries_for_wallet(
    db: &DatabaseConnection,
    tenant_id: i64,
    owner: WalletOwner,
) -> Result<Vec<ledger_entry::Model>> {
    let Some(wallet) = find_wallet(db, tenant_id, owner).await? else {
        return Ok(Vec::new());
    };
    if wallet.is_frozen {
        warn!(wallet_id = wallet.id, "Reading history of a frozen wallet");
    }

    LedgerEntry::find()
        .filter(ledger_entry::Column::TenantId.eq(tenant_id))
        .filter(
            Condition::any()
                .add(ledger_entry::Column::FromWalletId.eq(wallet.id))
                .add(ledger_entry::Column::ToWalletId.eq(wallet.id)),
        )
        .order_by_desc(ledger_entry::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
