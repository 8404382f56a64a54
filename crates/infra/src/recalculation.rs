//! Balance recalculation engine.
//!
//! Replays keys from zero and persists the resulting balances. The replay
//! itself is pure (`stockbook_inventory::replay`); this module owns reading
//! the ordered entries, locking the key, and writing back only what changed.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stockbook_auth::LedgerScope;
use stockbook_core::{ExpectedVersion, ProductId, StoreId};
use stockbook_inventory::{LedgerKey, replay};

use crate::error::LedgerError;
use crate::ledger_store::{KeyFilter, LedgerStore, Pagination};
use crate::locks::KeyLocks;

/// Outcome of recalculating one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRecalculation {
    pub key: LedgerKey,
    pub success: bool,
    /// Number of `done` entries replayed.
    pub entries: usize,
    /// Number of entries whose stored balance was rewritten.
    pub updated: usize,
    /// Balance after the last entry.
    pub balance: Option<Decimal>,
    pub error: Option<String>,
}

impl KeyRecalculation {
    fn succeeded(key: LedgerKey, entries: usize, updated: usize, balance: Decimal) -> Self {
        Self {
            key,
            success: true,
            entries,
            updated,
            balance: Some(balance),
            error: None,
        }
    }

    fn failed(key: LedgerKey, error: &LedgerError) -> Self {
        Self {
            key,
            success: false,
            entries: 0,
            updated: 0,
            balance: None,
            error: Some(error.to_string()),
        }
    }
}

/// Per-key results of one page of a full recalculation run.
#[derive(Debug, Clone, Serialize)]
pub struct RecalculationSummary {
    pub results: Vec<KeyRecalculation>,
    pub succeeded: usize,
    pub failed: usize,
    /// Number of keys across all pages.
    pub total_keys: u64,
    pub pagination: Pagination,
    pub has_more: bool,
    pub next_offset: Option<u32>,
}

#[derive(Debug)]
pub struct RecalculationEngine<S> {
    store: S,
    locks: Arc<KeyLocks>,
}

impl<S: Clone> Clone for RecalculationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S> RecalculationEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &Arc<KeyLocks> {
        &self.locks
    }

    /// Replay one key under its lock.
    #[instrument(skip(self), fields(key = %key))]
    pub fn recalculate_key(
        &self,
        scope: LedgerScope,
        key: LedgerKey,
    ) -> Result<KeyRecalculation, LedgerError> {
        scope.ensure(key.company_id)?;
        self.locks
            .with_key(key, || self.replay_and_persist(scope, key))
    }

    /// Replay one key and persist changed balances.
    ///
    /// The caller must already hold the key's lock.
    pub(crate) fn replay_and_persist(
        &self,
        scope: LedgerScope,
        key: LedgerKey,
    ) -> Result<KeyRecalculation, LedgerError> {
        let entries = self.store.list_for_replay(scope, &key)?;
        let replayed = replay(key, &entries)?;

        let mut updated = 0;
        for update in replayed.changed() {
            self.store.update_remaining(
                scope,
                update.transaction_id,
                ExpectedVersion::Exact(update.expected_revision),
                Some(update.remaining),
            )?;
            updated += 1;
        }

        for transfer in &replayed.transfers {
            self.store.update_remaining_after_transfer(
                scope,
                transfer.transfer_id,
                Some(transfer.remaining),
            )?;
        }

        debug!(
            entries = entries.len(),
            updated,
            transfers = replayed.transfers.len(),
            balance = %replayed.balance,
            "key replayed"
        );

        Ok(KeyRecalculation::succeeded(
            key,
            entries.len(),
            updated,
            replayed.balance,
        ))
    }

    /// Recalculate every key visible to `scope` for one product at one store.
    ///
    /// Unrestricted scopes may match the same product/store under several
    /// companies. No matching key at all is `NotFound`.
    #[instrument(skip(self))]
    pub fn recalculate_product_balance(
        &self,
        scope: LedgerScope,
        product_id: ProductId,
        store_id: StoreId,
    ) -> Result<Vec<KeyRecalculation>, LedgerError> {
        let filter = KeyFilter {
            product_id: Some(product_id),
            store_id: Some(store_id),
        };
        let page = self.store.keys(scope, &filter, Pagination::all())?;
        if page.keys.is_empty() {
            return Err(LedgerError::not_found(format!(
                "no ledger entries for product {product_id} at store {store_id}"
            )));
        }

        page.keys
            .into_iter()
            .map(|key| self.recalculate_key(scope, key))
            .collect()
    }

    /// Recalculate one page of the sorted key list.
    ///
    /// A failing key is recorded in the summary and the run moves on.
    #[instrument(skip(self), fields(offset = pagination.offset, limit = pagination.limit))]
    pub fn recalculate_all(
        &self,
        scope: LedgerScope,
        pagination: Pagination,
    ) -> Result<RecalculationSummary, LedgerError> {
        let page = self.store.keys(scope, &KeyFilter::default(), pagination)?;
        let next_offset = page.next_offset();

        let results: Vec<KeyRecalculation> = page
            .keys
            .iter()
            .map(|&key| {
                self.recalculate_key(scope, key).unwrap_or_else(|err| {
                    warn!(key = %key, error = %err, "key recalculation failed");
                    KeyRecalculation::failed(key, &err)
                })
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;

        info!(
            keys = results.len(),
            succeeded,
            failed,
            total_keys = page.total,
            has_more = page.has_more,
            "recalculation page finished"
        );

        Ok(RecalculationSummary {
            results,
            succeeded,
            failed,
            total_keys: page.total,
            pagination: page.pagination,
            has_more: page.has_more,
            next_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_store::InMemoryLedgerStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use stockbook_core::{TenantId, TransactionId, UserId};
    use stockbook_inventory::{MeasurementType, NewTransaction, TransactionStatus, TransactionType};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::days(n)
    }

    fn entry(key: LedgerKey, t: TransactionType, q: Decimal, d: i64) -> NewTransaction {
        NewTransaction {
            id: TransactionId::new(),
            company_id: key.company_id,
            transaction_type: t,
            status: TransactionStatus::Done,
            product_id: key.product_id,
            from_store: key.store_id,
            to_store: None,
            transfer_id: None,
            quantity: q,
            original_quantity: q,
            measurement_type: MeasurementType::Main,
            measurement_unit: "unit".to_string(),
            conversion_rate: Decimal::ONE,
            total_price: None,
            date: day(d),
            created_at: day(d),
            user: UserId::new(),
        }
    }

    fn engine() -> RecalculationEngine<Arc<InMemoryLedgerStore>> {
        RecalculationEngine::new(Arc::new(InMemoryLedgerStore::new()), Arc::new(KeyLocks::new()))
    }

    fn key() -> LedgerKey {
        LedgerKey::new(TenantId::new(), ProductId::new(), StoreId::new())
    }

    #[test]
    fn writes_running_balances_and_skips_unchanged() {
        let engine = engine();
        let k = key();
        engine
            .store()
            .append(vec![
                entry(k, TransactionType::Purchase, dec!(100), 1),
                entry(k, TransactionType::Sale, dec!(30), 2),
            ])
            .unwrap();
        let scope = LedgerScope::company(k.company_id);

        let first = engine.recalculate_key(scope, k).unwrap();
        assert_eq!(first.updated, 2);
        assert_eq!(first.balance, Some(dec!(70)));

        let second = engine.recalculate_key(scope, k).unwrap();
        assert!(second.success);
        assert_eq!(second.updated, 0);
    }

    #[test]
    fn foreign_key_is_not_authorized() {
        let engine = engine();
        let err = engine
            .recalculate_key(LedgerScope::company(TenantId::new()), key())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Authorization(_)));
    }

    #[test]
    fn unknown_product_store_is_not_found() {
        let engine = engine();
        let err = engine
            .recalculate_product_balance(LedgerScope::unrestricted(), ProductId::new(), StoreId::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn admin_recalculates_product_store_across_companies() {
        let engine = engine();
        let a = key();
        let b = LedgerKey::new(TenantId::new(), a.product_id, a.store_id);
        engine.store().append(vec![entry(a, TransactionType::Purchase, dec!(5), 1)]).unwrap();
        engine.store().append(vec![entry(b, TransactionType::Purchase, dec!(7), 1)]).unwrap();

        let results = engine
            .recalculate_product_balance(LedgerScope::unrestricted(), a.product_id, a.store_id)
            .unwrap();
        assert_eq!(results.len(), 2);

        let scoped = engine
            .recalculate_product_balance(LedgerScope::company(b.company_id), a.product_id, a.store_id)
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].balance, Some(dec!(7)));
    }

    #[test]
    fn full_run_pages_through_keys() {
        let engine = engine();
        let company = TenantId::new();
        for _ in 0..3 {
            let k = LedgerKey::new(company, ProductId::new(), StoreId::new());
            engine.store().append(vec![entry(k, TransactionType::Purchase, dec!(1), 1)]).unwrap();
        }
        let scope = LedgerScope::company(company);

        let first = engine.recalculate_all(scope, Pagination::new(Some(2), None)).unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(first.total_keys, 3);
        assert_eq!(first.next_offset, Some(2));

        let second = engine
            .recalculate_all(scope, Pagination::new(Some(2), first.next_offset))
            .unwrap();
        assert_eq!(second.results.len(), 1);
        assert!(!second.has_more);
        assert_eq!(second.next_offset, None);
        assert_eq!(second.failed, 0);
    }
}
