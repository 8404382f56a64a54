use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;

use stockbook_auth::LedgerScope;
use stockbook_core::{ExpectedVersion, TransactionId, TransferId};
use stockbook_inventory::{
    LedgerKey, LedgerTransaction, NewTransaction, TransactionStatus, TransactionType,
};

use super::query::{KeyFilter, KeyPage, Pagination, TransactionFilter, TransactionPage};
use super::r#trait::{LedgerStore, LedgerStoreError};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LedgerTransaction>,
    by_id: HashMap<TransactionId, usize>,
    by_key: BTreeMap<LedgerKey, Vec<usize>>,
    by_transfer: HashMap<TransferId, Vec<usize>>,
    last_sequence: u64,
}

impl Inner {
    fn index_of(&self, scope: LedgerScope, id: TransactionId) -> Result<usize, LedgerStoreError> {
        self.by_id
            .get(&id)
            .copied()
            .filter(|&idx| scope.permits(self.entries[idx].company_id))
            .ok_or_else(|| LedgerStoreError::NotFound(format!("transaction {id}")))
    }

    fn done_in_replay_order(&self, key: &LedgerKey) -> Vec<&LedgerTransaction> {
        let mut done: Vec<&LedgerTransaction> = self
            .by_key
            .get(key)
            .into_iter()
            .flatten()
            .map(|&idx| &self.entries[idx])
            .filter(|e| e.is_done())
            .collect();
        done.sort_by_key(|e| e.replay_position());
        done
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, LedgerStoreError> {
        self.inner
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, LedgerStoreError> {
        self.inner
            .write()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(
        &self,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError> {
        let Some(first) = entries.first() else {
            return Ok(vec![]);
        };

        // A batch is one movement: single company, unique ids.
        let company_id = first.company_id;
        let mut ids = HashSet::with_capacity(entries.len());
        for (idx, e) in entries.iter().enumerate() {
            if e.company_id != company_id {
                return Err(LedgerStoreError::TenantIsolation(format!(
                    "batch contains multiple company_ids (index {idx})"
                )));
            }
            if e.quantity <= Decimal::ZERO {
                return Err(LedgerStoreError::InvalidAppend(format!(
                    "non-positive quantity (index {idx})"
                )));
            }
            if !ids.insert(e.id) {
                return Err(LedgerStoreError::InvalidAppend(format!(
                    "duplicate transaction id {} in batch",
                    e.id
                )));
            }
        }

        let mut inner = self.write()?;

        if let Some(dup) = entries.iter().find(|e| inner.by_id.contains_key(&e.id)) {
            return Err(LedgerStoreError::InvalidAppend(format!(
                "transaction {} already exists",
                dup.id
            )));
        }

        let mut committed = Vec::with_capacity(entries.len());
        for e in entries {
            inner.last_sequence += 1;
            let stored = e.into_stored(inner.last_sequence);
            let idx = inner.entries.len();

            inner.by_id.insert(stored.id, idx);
            inner.by_key.entry(stored.key()).or_default().push(idx);
            if let Some(transfer_id) = stored.transfer_id {
                inner.by_transfer.entry(transfer_id).or_default().push(idx);
            }
            inner.entries.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn get(
        &self,
        scope: LedgerScope,
        id: TransactionId,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        let inner = self.read()?;
        let idx = inner.index_of(scope, id)?;
        Ok(inner.entries[idx].clone())
    }

    fn list_for_replay(
        &self,
        scope: LedgerScope,
        key: &LedgerKey,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError> {
        if !scope.permits(key.company_id) {
            return Ok(vec![]);
        }
        let inner = self.read()?;
        Ok(inner
            .done_in_replay_order(key)
            .into_iter()
            .cloned()
            .collect())
    }

    fn latest_for_key(
        &self,
        scope: LedgerScope,
        key: &LedgerKey,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        let not_found = || LedgerStoreError::NotFound(format!("no done entries for {key}"));
        if !scope.permits(key.company_id) {
            return Err(not_found());
        }
        let inner = self.read()?;
        inner
            .done_in_replay_order(key)
            .last()
            .map(|e| (*e).clone())
            .ok_or_else(not_found)
    }

    fn find(
        &self,
        scope: LedgerScope,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, LedgerStoreError> {
        let inner = self.read()?;
        let mut matching: Vec<&LedgerTransaction> = inner
            .entries
            .iter()
            .filter(|e| scope.permits(e.company_id) && filter.matches(e))
            .collect();
        matching.sort_by_key(|e| e.replay_position());

        let (page, has_more) = pagination.window(&matching);
        Ok(TransactionPage {
            transactions: page.into_iter().cloned().collect(),
            total: matching.len() as u64,
            pagination,
            has_more,
        })
    }

    fn keys(
        &self,
        scope: LedgerScope,
        filter: &KeyFilter,
        pagination: Pagination,
    ) -> Result<KeyPage, LedgerStoreError> {
        let inner = self.read()?;
        let matching: Vec<LedgerKey> = inner
            .by_key
            .keys()
            .filter(|k| scope.permits(k.company_id) && filter.matches(k))
            .copied()
            .collect();

        let (keys, has_more) = pagination.window(&matching);
        Ok(KeyPage {
            keys,
            total: matching.len() as u64,
            pagination,
            has_more,
        })
    }

    fn find_by_transfer(
        &self,
        scope: LedgerScope,
        transfer_id: TransferId,
    ) -> Result<Vec<LedgerTransaction>, LedgerStoreError> {
        let inner = self.read()?;
        let mut legs: Vec<LedgerTransaction> = inner
            .by_transfer
            .get(&transfer_id)
            .into_iter()
            .flatten()
            .map(|&idx| &inner.entries[idx])
            .filter(|e| scope.permits(e.company_id))
            .cloned()
            .collect();

        if legs.is_empty() {
            return Err(LedgerStoreError::NotFound(format!("transfer {transfer_id}")));
        }
        legs.sort_by_key(|e| e.transaction_type != TransactionType::Send);
        Ok(legs)
    }

    fn update_remaining(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        expected: ExpectedVersion,
        remaining: Option<Decimal>,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        let mut inner = self.write()?;
        let idx = inner.index_of(scope, id)?;
        let entry = &mut inner.entries[idx];

        if !expected.matches(entry.revision) {
            return Err(LedgerStoreError::Concurrency(format!(
                "transaction {id}: expected {expected:?}, found {}",
                entry.revision
            )));
        }

        entry.remaining = remaining;
        entry.revision += 1;
        Ok(entry.clone())
    }

    fn update_remaining_after_transfer(
        &self,
        scope: LedgerScope,
        transfer_id: TransferId,
        remaining_after_transfer: Option<Decimal>,
    ) -> Result<(), LedgerStoreError> {
        let mut inner = self.write()?;
        let send_idx = inner
            .by_transfer
            .get(&transfer_id)
            .into_iter()
            .flatten()
            .copied()
            .find(|&idx| {
                let e = &inner.entries[idx];
                e.transaction_type == TransactionType::Send && scope.permits(e.company_id)
            })
            .ok_or_else(|| {
                LedgerStoreError::NotFound(format!("send leg of transfer {transfer_id}"))
            })?;

        inner.entries[send_idx].remaining_after_transfer = remaining_after_transfer;
        Ok(())
    }

    fn update_status(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        expected: ExpectedVersion,
        status: TransactionStatus,
    ) -> Result<LedgerTransaction, LedgerStoreError> {
        let mut inner = self.write()?;
        let idx = inner.index_of(scope, id)?;
        let entry = &mut inner.entries[idx];

        if !expected.matches(entry.revision) {
            return Err(LedgerStoreError::Concurrency(format!(
                "transaction {id}: expected {expected:?}, found {}",
                entry.revision
            )));
        }

        entry.status = status;
        if status == TransactionStatus::Pending {
            entry.remaining = None;
            entry.remaining_after_transfer = None;
        }
        entry.revision += 1;
        Ok(entry.clone())
    }
}
