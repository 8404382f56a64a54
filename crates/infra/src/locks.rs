//! Per-key mutual exclusion for ledger writers.
//!
//! Appending to a key and replaying it must not interleave with another
//! writer on the same key, or two replays could each persist a balance
//! computed from a different set of entries. Different keys never block each
//! other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stockbook_inventory::LedgerKey;

#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<LedgerKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the locks of every key in `keys`.
    ///
    /// Keys are locked in sorted order so that two callers with overlapping
    /// key sets cannot deadlock. Duplicates are ignored.
    pub fn with_keys<R>(&self, keys: &[LedgerKey], f: impl FnOnce() -> R) -> R {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let slots: Vec<Arc<Mutex<()>>> = {
            let mut map = self.slots();
            ordered
                .iter()
                .map(|k| Arc::clone(map.entry(*k).or_default()))
                .collect()
        };

        let result = {
            // A panicking holder leaves no state behind the unit mutex.
            let _guards: Vec<MutexGuard<'_, ()>> = slots
                .iter()
                .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            f()
        };

        drop(slots);
        self.prune(&ordered);
        result
    }

    pub fn with_key<R>(&self, key: LedgerKey, f: impl FnOnce() -> R) -> R {
        self.with_keys(&[key], f)
    }

    /// Number of keys currently holding a lock slot.
    pub fn tracked(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<LedgerKey, Arc<Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, keys: &[LedgerKey]) {
        let mut map = self.slots();
        for key in keys {
            if map.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                map.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use stockbook_core::{ProductId, StoreId, TenantId};

    fn key() -> LedgerKey {
        LedgerKey::new(TenantId::new(), ProductId::new(), StoreId::new())
    }

    #[test]
    fn same_key_runs_exclusively() {
        let locks = Arc::new(KeyLocks::new());
        let k = key();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (locks, inside, max_seen) =
                    (Arc::clone(&locks), Arc::clone(&inside), Arc::clone(&max_seen));
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_key(k, || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn overlapping_key_sets_do_not_deadlock() {
        let locks = Arc::new(KeyLocks::new());
        let (a, b) = (key(), key());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let keys = if i % 2 == 0 { vec![a, b] } else { vec![b, a, b] };
                thread::spawn(move || {
                    for _ in 0..100 {
                        locks.with_keys(&keys, || ());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn returns_closure_result() {
        let locks = KeyLocks::new();
        assert_eq!(locks.with_key(key(), || 42), 42);
    }
}
