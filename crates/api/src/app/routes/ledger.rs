use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use stockbook_core::TransactionId;
use stockbook_infra::{KeyRecalculation, LedgerError};
use stockbook_inventory::LedgerKey;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/transactions", post(record_transaction).get(list_transactions))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/status", post(set_transaction_status))
        .route("/recalculate", post(recalculate_product_balance))
        .route("/recalculate-all", post(recalculate_all))
        .route("/availability", get(check_availability))
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, LedgerError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::RecordTransactionRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &body) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<_, LedgerError> {
        let company = caller.target_company(body.company_id()?)?;
        let command = body.into_command(company, caller.user_id())?;
        services.ledger.record(caller.scope(), command)
    })();

    respond(StatusCode::CREATED, result)
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListTransactionsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &query) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<dto::TransactionListResponse, LedgerError> {
        let scope = caller.narrowed_scope(query.company_id()?)?;
        let page = services
            .ledger
            .list(scope, &query.filter()?, query.pagination())?;
        Ok(dto::TransactionListResponse {
            total: page.total,
            limit: page.pagination.limit,
            offset: page.pagination.offset,
            has_more: page.has_more,
            items: page.transactions,
        })
    })();

    respond(StatusCode::OK, result)
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let caller = match authorize_request(&tenant, &principal, &dto::ListTransactionsQuery::default()) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id");
        }
    };

    respond(StatusCode::OK, services.ledger.get(caller.scope(), id))
}

pub async fn set_transaction_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::SetStatusRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &body) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id");
        }
    };

    let result = body
        .status()
        .and_then(|status| services.ledger.set_status(caller.scope(), id, status));

    respond(StatusCode::OK, result)
}

pub async fn recalculate_product_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::RecalculateRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &body) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<dto::Envelope<Vec<KeyRecalculation>>, LedgerError> {
        let scope = caller.narrowed_scope(body.company_id()?)?;
        let (product_id, store_id) = body.target()?;
        let results = services
            .ledger
            .recalculate_product_balance(scope, product_id, store_id)?;
        let updated: usize = results.iter().map(|r| r.updated).sum();
        Ok(dto::Envelope {
            success: true,
            message: format!(
                "recalculated {} key(s), {updated} balance(s) updated",
                results.len()
            ),
            data: results,
            page: None,
        })
    })();

    respond(StatusCode::OK, result)
}

pub async fn recalculate_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::RecalculateAllQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &query) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<dto::Envelope<Vec<KeyRecalculation>>, LedgerError> {
        let scope = caller.narrowed_scope(query.company_id()?)?;
        let pagination = services
            .ledger_config
            .recalculation_page(query.limit, query.offset);
        let summary = services.ledger.recalculate_all(scope, pagination)?;
        Ok(dto::Envelope {
            success: summary.failed == 0,
            message: format!(
                "recalculated {} key(s): {} succeeded, {} failed",
                summary.results.len(),
                summary.succeeded,
                summary.failed
            ),
            page: Some(dto::PageInfo {
                offset: summary.pagination.offset,
                limit: summary.pagination.limit,
                total: summary.total_keys,
                has_more: summary.has_more,
                next_offset: summary.next_offset,
            }),
            data: summary.results,
        })
    })();

    respond(StatusCode::OK, result)
}

pub async fn check_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::AvailabilityQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };
    let caller = match authorize_request(&tenant, &principal, &query) {
        Ok(c) => c,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = (|| -> Result<dto::AvailabilityResponse, LedgerError> {
        let company = caller.target_company(query.company_id()?)?;
        let (product_id, store_id, requested) = query.target()?;
        let key = LedgerKey::new(company, product_id, store_id);
        let availability = services
            .ledger
            .check_availability(caller.scope(), key, requested)?;
        Ok(dto::AvailabilityResponse::from(availability))
    })();

    respond(StatusCode::OK, result)
}
