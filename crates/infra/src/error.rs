//! Service-level error taxonomy.
//!
//! Every lower-layer error (domain validation, store failures, authorization)
//! is folded into [`LedgerError`] so callers see one consistent set of
//! outcomes.

use rust_decimal::Decimal;
use thiserror::Error;

use stockbook_auth::AuthzError;
use stockbook_core::DomainError;
use stockbook_inventory::LedgerKey;

use crate::ledger_store::LedgerStoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("insufficient stock for {key}: requested {requested}, remaining {remaining}")]
    InsufficientStock {
        key: LedgerKey,
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("store failure: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Stable machine-readable name, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Authorization(_) => "forbidden",
            LedgerError::Concurrency(_) => "concurrency_conflict",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::Store(_) => "store_error",
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::NotFound(msg) => Self::NotFound(msg),
            DomainError::Conflict(msg) => Self::Concurrency(msg),
            DomainError::Unauthorized(msg) => Self::Authorization(msg),
        }
    }
}

impl From<LedgerStoreError> for LedgerError {
    fn from(value: LedgerStoreError) -> Self {
        match value {
            LedgerStoreError::NotFound(msg) => Self::NotFound(msg),
            LedgerStoreError::Concurrency(msg) => Self::Concurrency(msg),
            LedgerStoreError::TenantIsolation(msg) => Self::Authorization(msg),
            LedgerStoreError::InvalidAppend(msg) => Self::Validation(msg),
            LedgerStoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl From<AuthzError> for LedgerError {
    fn from(value: AuthzError) -> Self {
        Self::Authorization(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_layer_errors_map_onto_taxonomy() {
        assert!(matches!(
            LedgerError::from(DomainError::conflict("stale")),
            LedgerError::Concurrency(_)
        ));
        assert!(matches!(
            LedgerError::from(DomainError::invalid_id("x")),
            LedgerError::Validation(_)
        ));
        assert!(matches!(
            LedgerError::from(LedgerStoreError::Backend("down".into())),
            LedgerError::Store(_)
        ));
        assert!(matches!(
            LedgerError::from(AuthzError::TenantMismatch),
            LedgerError::Authorization(_)
        ));
    }
}
