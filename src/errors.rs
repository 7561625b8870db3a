//! Unified error type for the timebank core.
//!
//! Variants fall into three groups: user-facing rejections (validation and
//! state conflicts), ledger integrity failures, and infrastructure errors.
//! Callers use [`Error::is_integrity_failure`] and [`Error::is_transient`] to
//! route them.

use rust_decimal::Decimal;
use sea_orm::{DbErr, RuntimeErr, sqlx};
use thiserror::Error;

/// All errors produced by the timebank core.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed shape or range validation
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Logged hours must be strictly positive
    #[error("Invalid hours: {hours} (must be greater than zero)")]
    InvalidHours {
        /// The rejected value
        hours: Decimal,
    },

    /// Ledger postings must move a strictly positive amount
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// The rejected value
        amount: Decimal,
    },

    /// The shift has no free slot left
    #[error("Shift {shift_id} is full (capacity {capacity})")]
    CapacityExceeded {
        /// Shift that was full
        shift_id: i64,
        /// Its capacity
        capacity: i32,
    },

    /// The user already holds an active application for the opportunity
    #[error("User {user_id} already has an active application for opportunity {opportunity_id}")]
    DuplicateApplication {
        /// Applicant
        user_id: i64,
        /// Opportunity applied to
        opportunity_id: i64,
    },

    /// A state transition was attempted on a record that is no longer pending
    #[error("{entity} {id} is not pending (status: {status})")]
    NotPending {
        /// Kind of record
        entity: &'static str,
        /// Record id
        id: i64,
        /// Current status
        status: String,
    },

    /// The id does not resolve within the caller's tenant
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Record id
        id: i64,
    },

    /// The actor lacks the required role
    #[error("User {user_id} is not allowed to {action}")]
    Forbidden {
        /// Acting user
        user_id: i64,
        /// What they attempted
        action: String,
    },

    /// The organization is not accepting volunteers
    #[error("Organization {organization_id} is not active")]
    OrganizationInactive {
        /// Organization id
        organization_id: i64,
    },

    /// The debit would take a non-overdraft wallet below zero
    #[error("Insufficient credits in wallet {wallet_id}: balance {balance}, required {required}")]
    InsufficientCredits {
        /// Wallet being debited
        wallet_id: i64,
        /// Its balance before the debit
        balance: Decimal,
        /// Amount requested
        required: Decimal,
    },

    /// The cached wallet balance disagrees with the ledger
    #[error("Ledger integrity violation on wallet {wallet_id}: ledger sum {ledger}, cached {cached}")]
    Integrity {
        /// Affected wallet
        wallet_id: i64,
        /// Balance derived from ledger entries
        ledger: Decimal,
        /// Materialized balance
        cached: Decimal,
    },

    /// The wallet was frozen after an integrity failure
    #[error("Wallet {wallet_id} is frozen pending manual review")]
    WalletFrozen {
        /// Affected wallet
        wallet_id: i64,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Details
        message: String,
    },

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Ledger corruption rather than user error. Never recovered locally.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Integrity { .. } | Self::WalletFrozen { .. })
    }

    /// Storage contention that may succeed on a later attempt.
    ///
    /// Only pool exhaustion and the driver's `SQLITE_BUSY` / `SQLITE_LOCKED`
    /// result codes qualify. Message text is never inspected.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(DbErr::ConnectionAcquire(_)) => true,
            Self::Database(
                DbErr::Exec(RuntimeErr::SqlxError(err))
                | DbErr::Query(RuntimeErr::SqlxError(err))
                | DbErr::Conn(RuntimeErr::SqlxError(err)),
            ) => is_sqlx_contention(err),
            _ => false,
        }
    }

    /// Data-driven rejection that should be shown to the user as-is.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidHours { .. }
                | Self::NonPositiveAmount { .. }
                | Self::CapacityExceeded { .. }
                | Self::DuplicateApplication { .. }
                | Self::NotPending { .. }
                | Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::OrganizationInactive { .. }
                | Self::InsufficientCredits { .. }
        )
    }
}

/// Primary result codes for a busy or locked `SQLite` database. Extended
/// codes carry the primary code in their low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_sqlx_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_integrity_errors_are_not_rejections() {
        let err = Error::Integrity {
            wallet_id: 1,
            ledger: Decimal::new(300, 2),
            cached: Decimal::new(200, 2),
        };
        assert!(err.is_integrity_failure());
        assert!(!err.is_rejection());
        assert!(!err.is_transient());

        let frozen = Error::WalletFrozen { wallet_id: 1 };
        assert!(frozen.is_integrity_failure());
    }

    #[test]
    fn test_state_conflicts_are_never_transient() {
        let not_pending = Error::NotPending {
            entity: "application",
            id: 3,
            status: "approved".to_string(),
        };
        let full = Error::CapacityExceeded {
            shift_id: 1,
            capacity: 2,
        };
        assert!(!not_pending.is_transient());
        assert!(!full.is_transient());
        assert!(not_pending.is_rejection());
        assert!(full.is_rejection());
    }

    #[test]
    fn test_contention_is_classified_by_driver_error() {
        let err = Error::Database(DbErr::ConnectionAcquire(
            sea_orm::ConnAcquireErr::Timeout,
        ));
        assert!(err.is_transient());

        let err = Error::Database(DbErr::Exec(RuntimeErr::SqlxError(
            sqlx::Error::PoolTimedOut,
        )));
        assert!(err.is_transient());

        let err = Error::Database(DbErr::Query(RuntimeErr::SqlxError(
            sqlx::Error::RowNotFound,
        )));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_lock_wording_in_messages_is_not_transient() {
        let err = Error::Database(DbErr::Custom("database is locked".to_string()));
        assert!(!err.is_transient());

        let err = Error::Validation {
            message: "deadlock detected in description".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_constraint_failures_from_sqlite_are_not_transient() {
        use sea_orm::{ConnectionTrait, Database};

        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_unprepared("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        db.execute_unprepared("INSERT INTO t (id) VALUES (1)")
            .await
            .unwrap();
        let err = db
            .execute_unprepared("INSERT INTO t (id) VALUES (1)")
            .await
            .unwrap_err();

        assert!(!Error::Database(err).is_transient());
    }
}
