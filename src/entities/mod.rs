//! Entity module - Contains all SeaORM entity definitions for the database.
//! Every table except `system_state` carries a `tenant_id` column and is only
//! ever queried with a tenant filter.

pub mod application;
pub mod badge;
pub mod hour_log;
pub mod ledger_entry;
pub mod opportunity;
pub mod organization;
pub mod organization_admin;
pub mod shift;
pub mod system_state;
pub mod wallet;

// Re-export specific types to avoid conflicts
pub use application::{
    Column as ApplicationColumn, Entity as Application, Model as ApplicationModel,
};
pub use badge::{Column as BadgeColumn, Entity as Badge, Model as BadgeModel};
pub use hour_log::{Column as HourLogColumn, Entity as HourLog, Model as HourLogModel};
pub use ledger_entry::{
    Column as LedgerEntryColumn, Entity as LedgerEntry, Model as LedgerEntryModel,
};
pub use opportunity::{
    Column as OpportunityColumn, Entity as Opportunity, Model as OpportunityModel,
};
pub use organization::{
    Column as OrganizationColumn, Entity as Organization, Model as OrganizationModel,
};
pub use organization_admin::{
    Column as OrganizationAdminColumn, Entity as OrganizationAdmin,
    Model as OrganizationAdminModel,
};
pub use shift::{Column as ShiftColumn, Entity as Shift, Model as ShiftModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
