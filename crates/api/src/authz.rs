//! API-side authorization guard.
//!
//! Requests are authorized at the HTTP boundary, before any service call,
//! and the resulting `LedgerScope` is what the services filter by.

use stockbook_auth::{AuthzError, CommandAuthorization, LedgerScope, Principal, authorize};
use stockbook_core::{TenantId, UserId};
use stockbook_infra::LedgerError;

use crate::context::{PrincipalContext, TenantContext};

/// A caller that passed the permission check for one request.
#[derive(Debug, Clone)]
pub struct AuthorizedCaller {
    principal: Principal,
    scope: LedgerScope,
}

impl AuthorizedCaller {
    pub fn scope(&self) -> LedgerScope {
        self.scope
    }

    pub fn user_id(&self) -> UserId {
        self.principal.principal_id.as_user_id()
    }

    pub fn tenant_id(&self) -> TenantId {
        self.principal.active_tenant_id
    }

    /// Company a write targets: the token's company unless one is named.
    ///
    /// Only unrestricted callers may name a company other than their own.
    pub fn target_company(&self, requested: Option<TenantId>) -> Result<TenantId, LedgerError> {
        let company = requested.unwrap_or_else(|| self.tenant_id());
        self.scope.ensure(company)?;
        Ok(company)
    }

    /// Scope for a read, optionally narrowed to one named company.
    pub fn narrowed_scope(&self, requested: Option<TenantId>) -> Result<LedgerScope, LedgerError> {
        match requested {
            None => Ok(self.scope),
            Some(company) => {
                self.scope.ensure(company)?;
                Ok(LedgerScope::company(company))
            }
        }
    }
}

/// Check authorization for a request in the current request context.
///
/// This is intended to be called **before** touching any service.
pub fn authorize_request<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    request: &C,
) -> Result<AuthorizedCaller, AuthzError> {
    let principal = Principal::from_roles(
        principal.principal_id(),
        tenant.tenant_id(),
        principal.roles().to_vec(),
    );

    for perm in request.required_permissions() {
        authorize(&principal, perm)?;
    }

    let scope = LedgerScope::for_principal(&principal);
    Ok(AuthorizedCaller { principal, scope })
}
