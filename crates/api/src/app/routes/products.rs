use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use stockbook_infra::LedgerError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(list_products).post(register_product))
}

/// Register or replace the measurement units of a product.
///
/// Answers 201 for a new product and 200 when existing units were replaced.
pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::RegisterProductRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &body) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<(StatusCode, dto::ProductUnitsResponse), LedgerError> {
        let company_id = caller.target_company(body.company_id()?)?;
        let units = body.into_units()?;
        let previous = services
            .ledger
            .register_product(caller.scope(), company_id, units.clone())?;
        let status = if previous.is_some() {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        Ok((status, dto::ProductUnitsResponse { company_id, units }))
    })();

    match result {
        Ok((status, body)) => (status, Json(body)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ProductsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &query) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<Vec<dto::ProductUnitsResponse>, LedgerError> {
        let company_id = caller.target_company(query.company_id()?)?;
        let products = services.ledger.products(caller.scope(), company_id)?;
        Ok(products
            .into_iter()
            .map(|units| dto::ProductUnitsResponse { company_id, units })
            .collect())
    })();

    match result {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
