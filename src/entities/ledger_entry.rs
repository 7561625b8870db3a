//! Ledger entry entity - One append-only movement of time credits.
//!
//! Entries are never updated or deleted. `reference` is unique per tenant and
//! makes postings idempotent (e.g., `hour-log:42`).
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// Wallet debited
    pub from_wallet_id: i64,
    /// Wallet credited
    pub to_wallet_id: i64,
    /// Amount moved, in hundredths of a credit (always > 0)
    pub amount_hundredths: i64,
    /// Idempotency key
    pub reference: String,
    /// Human-readable description
    pub description: String,
    /// User who caused the posting
    pub created_by: i64,
    /// When the entry was appended
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Amount as a fixed-point value
    #[must_use]
    pub fn amount(&self) -> Decimal {
        crate::core::credits::from_hundredths(self.amount_hundredths)
    }
}

/// Defines relationships between `LedgerEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Debited wallet
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::FromWalletId",
        to = "super::wallet::Column::Id"
    )]
    FromWallet,
    /// Credited wallet
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::ToWalletId",
        to = "super::wallet::Column::Id"
    )]
    ToWallet,
}

impl ActiveModelBehavior for ActiveModel {}
