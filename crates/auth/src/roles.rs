use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles are opaque strings on the wire; the well-known ones are exposed as
/// constants and mapped to permissions by [`crate::permissions_for_roles`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Platform administrator: every permission, no company scoping.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    /// Company manager: full ledger access within the company.
    pub const MANAGER: Role = Role(Cow::Borrowed("manager"));
    /// Store clerk: records movements and checks stock.
    pub const CLERK: Role = Role(Cow::Borrowed("clerk"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN.as_str()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
