use std::collections::HashSet;

use thiserror::Error;

use stockbook_core::TenantId;

use crate::{Permission, PrincipalId, Role, TenantMembership};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

impl Principal {
    /// Resolve a principal from token data, expanding roles into permissions.
    pub fn from_roles(principal_id: PrincipalId, tenant_id: TenantId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            principal_id,
            active_tenant_id: tenant_id,
            membership: TenantMembership {
                tenant_id,
                roles,
                permissions,
            },
        }
    }

    pub fn is_admin(&self) -> bool {
        self.membership.roles.iter().any(Role::is_admin)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Role → permission mapping for the well-known roles.
///
/// Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted: Vec<Permission> = Vec::new();
    let mut grant = |p: Permission| {
        if !granted.contains(&p) {
            granted.push(p);
        }
    };

    for role in roles {
        match role.as_str() {
            "admin" => grant(Permission::WILDCARD),
            "manager" => {
                grant(Permission::LEDGER_TRANSACTIONS_CREATE);
                grant(Permission::LEDGER_TRANSACTIONS_READ);
                grant(Permission::LEDGER_TRANSACTIONS_STATUS);
                grant(Permission::LEDGER_RECALCULATE);
                grant(Permission::LEDGER_AVAILABILITY_READ);
                grant(Permission::PRODUCTS_MANAGE);
            }
            "clerk" => {
                grant(Permission::LEDGER_TRANSACTIONS_CREATE);
                grant(Permission::LEDGER_TRANSACTIONS_READ);
                grant(Permission::LEDGER_AVAILABILITY_READ);
            }
            _ => {}
        }
    }

    granted
}

/// Authorize a principal within its active tenant context.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
