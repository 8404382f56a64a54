//! Company scoping for ledger queries.

use serde::Serialize;

use stockbook_core::TenantId;

use crate::{AuthzError, Principal};

/// Which companies a ledger operation may see.
///
/// Computed once at the request boundary and passed into every query: a
/// company-bound scope filters by `company_id`, an unrestricted scope (admin)
/// sees every company.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerScope {
    company_id: Option<TenantId>,
}

impl LedgerScope {
    pub fn company(company_id: TenantId) -> Self {
        Self {
            company_id: Some(company_id),
        }
    }

    pub fn unrestricted() -> Self {
        Self { company_id: None }
    }

    /// Admins bypass company scoping; everyone else is bound to their company.
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.is_admin() {
            Self::unrestricted()
        } else {
            Self::company(principal.active_tenant_id)
        }
    }

    pub fn company_id(&self) -> Option<TenantId> {
        self.company_id
    }

    pub fn is_unrestricted(&self) -> bool {
        self.company_id.is_none()
    }

    pub fn permits(&self, company_id: TenantId) -> bool {
        self.company_id.is_none_or(|c| c == company_id)
    }

    pub fn ensure(&self, company_id: TenantId) -> Result<(), AuthzError> {
        if self.permits(company_id) {
            Ok(())
        } else {
            Err(AuthzError::TenantMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};

    #[test]
    fn admin_scope_is_unrestricted() {
        let p = Principal::from_roles(PrincipalId::new(), TenantId::new(), vec![Role::ADMIN]);
        let scope = LedgerScope::for_principal(&p);
        assert!(scope.is_unrestricted());
        assert!(scope.permits(TenantId::new()));
    }

    #[test]
    fn company_scope_only_permits_its_company() {
        let tenant = TenantId::new();
        let p = Principal::from_roles(PrincipalId::new(), tenant, vec![Role::MANAGER]);
        let scope = LedgerScope::for_principal(&p);
        assert_eq!(scope.company_id(), Some(tenant));
        assert!(scope.ensure(tenant).is_ok());
        assert_eq!(scope.ensure(TenantId::new()), Err(AuthzError::TenantMismatch));
    }
}
