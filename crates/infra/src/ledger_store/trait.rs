use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use stockbook_auth::LedgerScope;
use stockbook_core::{ExpectedVersion, TransactionId, TransferId};
use stockbook_inventory::{LedgerKey, LedgerTransaction, NewTransaction, TransactionStatus};

use super::query::{KeyFilter, KeyPage, Pagination, TransactionFilter, TransactionPage};

/// Ledger store operation error.
///
/// These are storage-level failures (missing records, revision conflicts,
/// isolation violations) as opposed to domain validation errors.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Append-only, company-scoped ledger of stock movements.
///
/// Entries are never deleted. The only mutable fields are the derived
/// balances (`remaining`, `remaining_after_transfer`) and `status`; every
/// balance or status write goes through a revision check so that a stale
/// writer cannot overwrite a newer replay.
///
/// ## Scoping
///
/// Every read takes a [`LedgerScope`]. A company-bound scope only ever sees
/// that company's entries; an entry outside the scope is reported as
/// `NotFound` rather than leaking its existence.
///
/// ## Ordering
///
/// `append` assigns a store-wide, monotonically increasing `sequence`.
/// Replay order is `(date, sequence)`.
///
/// ## Implementation requirements
///
/// - `append` is atomic: all entries of a batch are persisted or none are
/// - revision checks and writes happen under the same lock or transaction
/// - reads return owned snapshots
pub trait LedgerStore: Send + Sync {
    /// Append new entries (all or nothing) and return them as stored.
    fn append(
        &self,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError>;

    fn get(
        &self,
        scope: LedgerScope,
        id: TransactionId,
    ) -> Result<LedgerTransaction, LedgerStoreError>;

    /// All `done` entries of a key, in `(date, sequence)` order.
    fn list_for_replay(
        &self,
        scope: LedgerScope,
        key: &LedgerKey,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError>;

    /// Last `done` entry of a key in replay order (`NotFound` when none).
    fn latest_for_key(
        &self,
        scope: LedgerScope,
        key: &LedgerKey,
    ) -> Result<LedgerTransaction, LedgerStoreError>;

    fn find(
        &self,
        scope: LedgerScope,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, LedgerStoreError>;

    /// Distinct keys with at least one entry (of any status), in key order.
    fn keys(
        &self,
        scope: LedgerScope,
        filter: &KeyFilter,
        pagination: Pagination,
    ) -> Result<KeyPage, LedgerStoreError>;

    /// Both legs of a transfer, send leg first.
    fn find_by_transfer(
        &self,
        scope: LedgerScope,
        transfer_id: TransferId,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError>;

    /// Write a replayed balance. Bumps the entry's revision.
    fn update_remaining(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        expected: ExpectedVersion,
        remaining: Option<Decimal>,
    ) -> Result<LedgerTransaction, LedgerStoreError>;

    /// Mirror the destination balance onto a transfer's send leg.
    ///
    /// Does not bump the revision: the value is owned by the destination
    /// key's replay, not by the send leg's own key.
    fn update_remaining_after_transfer(
        &self,
        scope: LedgerScope,
        transfer_id: TransferId,
        remaining_after_transfer: Option<Decimal>,
    ) -> Result<(), LedgerStoreError>;

    /// Change an entry's status. Moving to `pending` clears derived balances.
    fn update_status(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        expected: ExpectedVersion,
        status: TransactionStatus,
    ) -> Result<LedgerTransaction, LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn append(
        &self,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError> {
        (**self).append(entries)
    }

    fn get(
        &self,
        scope: LedgerScope,
        id: TransactionId,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        (**self).get(scope, id)
    }

    fn list_for_replay(
        &self,
        scope: LedgerScope,
        key: &LedgerKey,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError> {
        (**self).list_for_replay(scope, key)
    }

    fn latest_for_key(
        &self,
        scope: LedgerScope,
        key: &LedgerKey,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        (**self).latest_for_key(scope, key)
    }

    fn find(
        &self,
        scope: LedgerScope,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, LedgerStoreError> {
        (**self).find(scope, filter, pagination)
    }

    fn keys(
        &self,
        scope: LedgerScope,
        filter: &KeyFilter,
        pagination: Pagination,
    ) -> Result<KeyPage, LedgerStoreError> {
        (**self).keys(scope, filter, pagination)
    }

    fn find_by_transfer(
        &self,
        scope: LedgerScope,
        transfer_id: TransferId,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError> {
        (**self).find_by_transfer(scope, transfer_id)
    }

    fn update_remaining(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        expected: ExpectedVersion,
        remaining: Option<Decimal>,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        (**self).update_remaining(scope, id, expected, remaining)
    }

    fn update_remaining_after_transfer(
        &self,
        scope: LedgerScope,
        transfer_id: TransferId,
        remaining_after_transfer: Option<Decimal>,
    ) -> Result<(), LedgerStoreError> {
        (**self).update_remaining_after_transfer(scope, transfer_id, remaining_after_transfer)
    }

    fn update_status(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        expected: ExpectedVersion,
        status: TransactionStatus,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        (**self).update_status(scope, id, expected, status)
    }
}
