/// Database configuration and connection management
pub mod database;

/// Deployment policy loading from timebank.toml
pub mod policy;

pub use policy::{BadgeRule, LedgerPolicy, PlatformPolicy, Policy, RetryPolicy};
