//! Request context threaded through every core operation.
//!
//! The presentation layer resolves the session and tenant before calling in;
//! the core never reads ambient state.

use serde::{Deserialize, Serialize};

/// Who is acting, and in which tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tenant every read and write is scoped to
    pub tenant_id: i64,
    /// Authenticated user performing the operation
    pub user_id: i64,
}

impl RequestContext {
    /// Creates a context for `user_id` acting within `tenant_id`.
    #[must_use]
    pub const fn new(tenant_id: i64, user_id: i64) -> Self {
        Self { tenant_id, user_id }
    }

    /// Same tenant, different actor.
    #[must_use]
    pub const fn as_user(self, user_id: i64) -> Self {
        Self {
            tenant_id: self.tenant_id,
            user_id,
        }
    }
}
