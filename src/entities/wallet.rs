//! Wallet entity - Materialized balance of a member, organization or the
//! community pool.
//!
//! The ledger is the source of truth; `balance_hundredths` is a cache that
//! must always equal the signed sum of ledger entries touching the wallet.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Unique identifier for the wallet
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant scope
    pub tenant_id: i64,
    /// `"member"`, `"organization"` or `"community_pool"`
    pub owner_kind: String,
    /// User or organization id; 0 for the community pool
    pub owner_id: i64,
    /// Cached balance in hundredths of a credit
    pub balance_hundredths: i64,
    /// Set when reconciliation failed; blocks further postings
    pub is_frozen: bool,
    /// When the wallet was first touched
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Cached balance as a fixed-point value
    #[must_use]
    pub fn balance(&self) -> Decimal {
        crate::core::credits::from_hundredths(self.balance_hundredths)
    }
}

/// Wallets are referenced by ledger entries through plain ids
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
