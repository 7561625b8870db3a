//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs. The composite unique indexes
//! that back ledger idempotency, wallet identity, admin membership and badge grants are
//! created explicitly afterwards, since they span more than one column.

use crate::entities::{
    Application, Badge, HourLog, LedgerEntry, Opportunity, Organization, OrganizationAdmin, Shift,
    SystemState, Wallet, badge, ledger_entry, organization_admin, wallet,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/timebank.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set. The
/// directory holding a file-backed `SQLite` database is created if missing.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);

    if let Some(path) = database_url.strip_prefix("sqlite://") {
        let file = path.split('?').next().unwrap_or(path);
        if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and unique indexes if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Organization).await?;
    create_table(db, &schema, OrganizationAdmin).await?;
    create_table(db, &schema, Opportunity).await?;
    create_table(db, &schema, Shift).await?;
    create_table(db, &schema, Application).await?;
    create_table(db, &schema, HourLog).await?;
    create_table(db, &schema, Wallet).await?;
    create_table(db, &schema, LedgerEntry).await?;
    create_table(db, &schema, Badge).await?;
    create_table(db, &schema, SystemState).await?;

    let indexes = [
        Index::create()
            .name("idx_ledger_entries_tenant_reference")
            .table(LedgerEntry)
            .col(ledger_entry::Column::TenantId)
            .col(ledger_entry::Column::Reference)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_wallets_owner")
            .table(Wallet)
            .col(wallet::Column::TenantId)
            .col(wallet::Column::OwnerKind)
            .col(wallet::Column::OwnerId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_organization_admins_member")
            .table(OrganizationAdmin)
            .col(organization_admin::Column::OrganizationId)
            .col(organization_admin::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_badges_user_name")
            .table(Badge)
            .col(badge::Column::TenantId)
            .col(badge::Column::UserId)
            .col(badge::Column::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];

    for index in &indexes {
        db.execute(builder.build(index)).await?;
    }

    info!("Database schema ready");
    Ok(())
}
