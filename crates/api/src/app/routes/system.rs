use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use stockbook_auth::{LedgerScope, Principal};

use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let resolved = Principal::from_roles(
        principal.principal_id(),
        tenant.tenant_id(),
        principal.roles().to_vec(),
    );
    let scope = LedgerScope::for_principal(&resolved);

    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "principal_id": principal.principal_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": resolved
            .membership
            .permissions
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>(),
        "unrestricted": scope.is_unrestricted(),
    }))
}
