//! Core business logic - framework-agnostic ledger and volunteering workflows.
//!
//! Every operation takes a [`crate::context::RequestContext`] (or an explicit
//! tenant id) and scopes all reads and writes to that tenant. Functions generic
//! over `ConnectionTrait` can run inside a caller's transaction.

pub mod application;
pub mod autopay;
pub mod badge;
pub mod credits;
pub mod hour_log;
pub mod ledger;
pub mod opportunity;
pub mod organization;
pub mod reconcile;
pub mod retry;
pub mod shift;
