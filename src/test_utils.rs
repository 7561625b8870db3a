//! Shared test utilities for the timebank core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::{PlatformPolicy, Policy},
    context::RequestContext,
    core::{
        hour_log::{self, HourLogSubmission},
        opportunity::{self, NewOpportunity},
        organization::{self, OrganizationStatus},
        shift::{self, NewShift},
    },
    entities,
    errors::Result,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Tenant used by most tests
pub const TENANT: i64 = 1;
/// A second tenant for isolation checks
pub const OTHER_TENANT: i64 = 2;
/// Owner of every organization created by the helpers
pub const ADMIN: i64 = 100;
/// Member who applies and logs hours
pub const VOLUNTEER: i64 = 200;
/// Platform operator who activates organizations
pub const OPERATOR: i64 = 900;

/// Context for `user_id` acting in [`TENANT`].
pub const fn test_ctx(user_id: i64) -> RequestContext {
    RequestContext::new(TENANT, user_id)
}

/// Default policy with [`OPERATOR`] as the only platform operator.
pub fn test_policy() -> Policy {
    Policy {
        platform: PlatformPolicy {
            operators: vec![OPERATOR],
        },
        ..Policy::default()
    }
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Registers an organization owned by [`ADMIN`] and has [`OPERATOR`]
/// activate it.
///
/// # Defaults
/// * `name`: "Test Organization"
/// * `status`: active
pub async fn create_test_organization(
    db: &DatabaseConnection,
    auto_pay: bool,
) -> Result<entities::organization::Model> {
    let org = organization::register_organization(
        db,
        &test_ctx(ADMIN),
        "Test Organization".to_string(),
        auto_pay,
    )
    .await?;
    organization::set_organization_status(
        db,
        &test_ctx(OPERATOR),
        &test_policy(),
        org.id,
        OrganizationStatus::Active,
    )
    .await
}

/// Publishes an opportunity as [`ADMIN`] with empty optional fields.
pub async fn create_test_opportunity(
    db: &DatabaseConnection,
    organization_id: i64,
    title: &str,
) -> Result<entities::opportunity::Model> {
    opportunity::create_opportunity(
        db,
        &test_ctx(ADMIN),
        NewOpportunity {
            organization_id,
            title: title.to_string(),
            category: "community".to_string(),
            ..NewOpportunity::default()
        },
    )
    .await
}

/// Creates a two-hour shift starting tomorrow.
pub async fn create_test_shift(
    db: &DatabaseConnection,
    opportunity_id: i64,
    capacity: i32,
) -> Result<entities::shift::Model> {
    let start = Utc::now() + Duration::days(1);
    shift::create_shift(
        db,
        &test_ctx(ADMIN),
        NewShift {
            opportunity_id,
            start_time: start,
            end_time: start + Duration::hours(2),
            capacity,
        },
    )
    .await
}

/// Submits a pending hour log for [`VOLUNTEER`].
///
/// # Defaults
/// * `date`: 2024-05-04
/// * `opportunity_id`: None
pub async fn create_test_hour_log(
    db: &DatabaseConnection,
    organization_id: i64,
    hours: Decimal,
) -> Result<entities::hour_log::Model> {
    hour_log::submit(
        db,
        &test_ctx(VOLUNTEER),
        HourLogSubmission {
            organization_id,
            opportunity_id: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap_or_default(),
            hours,
            description: "Test hours".to_string(),
        },
    )
    .await
}

/// Sets up a complete test environment with an active organization and one
/// opportunity. Returns (db, organization, opportunity).
pub async fn setup_with_opportunity(
    auto_pay: bool,
) -> Result<(
    DatabaseConnection,
    entities::organization::Model,
    entities::opportunity::Model,
)> {
    let db = setup_test_db().await?;
    let org = create_test_organization(&db, auto_pay).await?;
    let opp = create_test_opportunity(&db, org.id, "Test Opportunity").await?;
    Ok((db, org, opp))
}
