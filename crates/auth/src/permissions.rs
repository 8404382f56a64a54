use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "ledger.recalculate").
/// The wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const LEDGER_TRANSACTIONS_CREATE: Permission =
        Permission::from_static("ledger.transactions.create");
    pub const LEDGER_TRANSACTIONS_READ: Permission =
        Permission::from_static("ledger.transactions.read");
    pub const LEDGER_TRANSACTIONS_STATUS: Permission =
        Permission::from_static("ledger.transactions.status");
    pub const LEDGER_RECALCULATE: Permission = Permission::from_static("ledger.recalculate");
    pub const LEDGER_AVAILABILITY_READ: Permission =
        Permission::from_static("ledger.availability.read");
    pub const PRODUCTS_MANAGE: Permission = Permission::from_static("products.manage");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
