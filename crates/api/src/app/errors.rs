use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockbook_auth::AuthzError;
use stockbook_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match &err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Authorization(_) => StatusCode::FORBIDDEN,
        LedgerError::Concurrency(_) => StatusCode::CONFLICT,
        LedgerError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    json_error(status, err.kind(), err.to_string())
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
