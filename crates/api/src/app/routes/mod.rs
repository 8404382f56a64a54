use axum::{Router, routing::get};

pub mod ledger;
pub mod products;
pub mod system;

/// Router for all authenticated (company-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/ledger", ledger::router())
        .nest("/products", products::router())
}
