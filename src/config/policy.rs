//! Deployment policy loaded from `timebank.toml`.
//!
//! The policy file controls which wallet kinds may go negative, which badges
//! are granted at which hour thresholds, and how transient storage contention
//! is retried. It also names the platform operators who activate
//! organizations. Every section is optional; missing sections fall back to
//! [`Default`].

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the policy file
pub const CONFIG_PATH_ENV: &str = "TIMEBANK_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "timebank.toml";

/// Complete deployment policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Overdraft rules per wallet kind
    pub ledger: LedgerPolicy,
    /// Hour-threshold badges
    pub badges: Vec<BadgeRule>,
    /// Retry behaviour for transient contention
    pub retry: RetryPolicy,
    /// Platform-level actors
    pub platform: PlatformPolicy,
}

/// Users who run the platform rather than any one organization.
///
/// Only operators may activate or suspend an organization, so an owner cannot
/// approve their own registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlatformPolicy {
    /// User ids allowed to change organization status
    pub operators: Vec<i64>,
}

impl PlatformPolicy {
    /// Whether `user_id` is a platform operator
    #[must_use]
    pub fn is_operator(&self, user_id: i64) -> bool {
        self.operators.contains(&user_id)
    }
}

/// Which wallet kinds may hold a negative balance.
///
/// Organizations issue credits, so by default their wallets may go negative;
/// members and the community pool may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Member wallets may go negative
    pub member_overdraft: bool,
    /// Organization wallets may go negative
    pub organization_overdraft: bool,
    /// The community pool may go negative
    pub pool_overdraft: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            member_overdraft: false,
            organization_overdraft: true,
            pool_overdraft: false,
        }
    }
}

/// A badge granted once a volunteer's verified hours reach `hours`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BadgeRule {
    /// Badge name, unique per user
    pub name: String,
    /// Icon identifier
    pub icon: String,
    /// Verified-hour threshold
    pub hours: Decimal,
}

/// Bounded exponential backoff for transient storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 25,
            max_delay_ms: 500,
        }
    }
}

impl Policy {
    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }

        let mut names = HashSet::new();
        for rule in &self.badges {
            if !names.insert(rule.name.as_str()) {
                return Err(Error::Config {
                    message: format!("badge '{}' is configured more than once", rule.name),
                });
            }
            if rule.name.trim().is_empty() {
                return Err(Error::Config {
                    message: "badge name cannot be empty".to_string(),
                });
            }
            if rule.hours <= Decimal::ZERO {
                return Err(Error::Config {
                    message: format!("badge '{}' needs a positive hour threshold", rule.name),
                });
            }
        }

        Ok(())
    }
}

/// Loads and validates the policy from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value fails [`Policy::validate`]
pub fn load_policy<P: AsRef<Path>>(path: P) -> Result<Policy> {
    let path_ref = path.as_ref();
    debug!("Loading policy from {:?}", path_ref);

    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read policy file {}: {e}", path_ref.display()),
    })?;

    load_policy_from_str(&contents).map_err(|e| match e {
        Error::Config { message } => Error::Config {
            message: format!("{}: {message}", path_ref.display()),
        },
        other => other,
    })
}

/// Parses and validates a policy from TOML text.
pub fn load_policy_from_str(contents: &str) -> Result<Policy> {
    let policy: Policy = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse policy: {e}"),
    })?;
    policy.validate()?;

    Ok(policy)
}

/// Loads the policy named by `TIMEBANK_CONFIG` (default `./timebank.toml`).
///
/// A missing default file is not an error: the built-in defaults apply.
pub fn load_default_policy() -> Result<Policy> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_policy(path),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_policy(DEFAULT_CONFIG_PATH),
        Err(_) => {
            info!("No policy file found, using defaults");
            Ok(Policy::default())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_policy() {
        let toml_str = r#"
            [ledger]
            member_overdraft = false
            organization_overdraft = false

            [[badges]]
            name = "First Steps"
            icon = "seedling"
            hours = 1

            [[badges]]
            name = "Half Century"
            icon = "medal"
            hours = "50.5"

            [retry]
            max_attempts = 5

            [platform]
            operators = [1, 7]
        "#;

        let policy: Policy = toml::from_str(toml_str).unwrap();
        assert!(!policy.ledger.organization_overdraft);
        assert!(!policy.ledger.pool_overdraft);
        assert_eq!(policy.badges.len(), 2);
        assert_eq!(policy.badges[0].hours, Decimal::from(1));
        assert_eq!(policy.badges[1].hours, Decimal::new(505, 1));
        assert_eq!(policy.retry.max_attempts, 5);
        assert_eq!(policy.retry.base_delay_ms, 25);
        assert!(policy.platform.is_operator(7));
        assert!(!policy.platform.is_operator(2));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_empty_policy_uses_defaults() {
        let policy: Policy = toml::from_str("").unwrap();
        assert!(policy.ledger.organization_overdraft);
        assert!(!policy.ledger.member_overdraft);
        assert!(policy.badges.is_empty());
        assert_eq!(policy.retry, RetryPolicy::default());
        assert!(policy.platform.operators.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut policy = Policy::default();
        policy.retry.max_attempts = 0;
        assert!(matches!(policy.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_non_positive_threshold() {
        let policy = Policy {
            badges: vec![BadgeRule {
                name: "Nothing".to_string(),
                icon: "zero".to_string(),
                hours: Decimal::ZERO,
            }],
            ..Policy::default()
        };
        assert!(matches!(policy.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_badge_names() {
        let toml_str = r#"
            [[badges]]
            name = "Star"
            icon = "star"
            hours = 1

            [[badges]]
            name = "Star"
            icon = "star"
            hours = 2
        "#;

        let policy: Policy = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            policy.validate(),
            Err(Error::Config { ref message }) if message.contains("Star")
        ));
        assert!(matches!(
            load_policy_from_str(toml_str),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_load_policy_missing_file() {
        let result = load_policy("/definitely/not/here/timebank.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
