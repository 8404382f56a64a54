//! Running-balance replay.
//!
//! `remaining` is never trusted on its own: it is what you get by starting at
//! zero and applying every `done` entry of a key in `(date, sequence)` order.
//! This module is that computation and nothing else; persisting the results
//! is the caller's job.

use std::ops::Bound;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockbook_core::{DomainError, DomainResult, TransactionId, TransferId};

use crate::transaction::{LedgerKey, LedgerTransaction, TransactionType};

/// Replayed balance of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub transaction_id: TransactionId,
    /// Revision the entry had when it was read for replay.
    pub expected_revision: u64,
    /// Stored value before replay.
    pub previous: Option<Decimal>,
    pub remaining: Decimal,
}

impl BalanceUpdate {
    /// Whether the stored value differs from the replayed one.
    pub fn is_change(&self) -> bool {
        self.previous != Some(self.remaining)
    }
}

/// Balance at a transfer's destination right after its receive leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBalance {
    pub transfer_id: TransferId,
    pub remaining: Decimal,
}

/// Result of replaying one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub key: LedgerKey,
    /// One update per `done` entry, in replay order.
    pub updates: Vec<BalanceUpdate>,
    /// Receive legs seen during replay, in replay order.
    pub transfers: Vec<TransferBalance>,
    /// Balance after the last entry (zero for an empty ledger).
    pub balance: Decimal,
}

impl Replay {
    pub fn changed(&self) -> impl Iterator<Item = &BalanceUpdate> {
        self.updates.iter().filter(|u| u.is_change())
    }

    pub fn latest(&self) -> Option<&BalanceUpdate> {
        self.updates.last()
    }
}

/// Replay the `done` entries of `key` from zero.
///
/// Input order does not matter; entries are sorted by `(date, sequence)`.
/// Pending entries are skipped. An entry belonging to another key is rejected
/// rather than silently mixed into the balance.
pub fn replay(key: LedgerKey, entries: &[LedgerTransaction]) -> DomainResult<Replay> {
    let mut ordered: Vec<&LedgerTransaction> = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        if entry.key() != key {
            return Err(DomainError::unauthorized(format!(
                "entry at index {idx} belongs to {} instead of {key}",
                entry.key()
            )));
        }
        if entry.is_done() {
            ordered.push(entry);
        }
    }
    ordered.sort_by_key(|e| e.replay_position());

    let mut balance = Decimal::ZERO;
    let mut updates = Vec::with_capacity(ordered.len());
    let mut transfers = Vec::new();

    for entry in ordered {
        balance = balance
            .checked_add(entry.signed_delta())
            .ok_or_else(|| DomainError::validation(format!("balance overflow for {key}")))?;

        updates.push(BalanceUpdate {
            transaction_id: entry.id,
            expected_revision: entry.revision,
            previous: entry.remaining,
            remaining: balance,
        });

        if entry.transaction_type == TransactionType::Receive {
            if let Some(transfer_id) = entry.transfer_id {
                transfers.push(TransferBalance {
                    transfer_id,
                    remaining: balance,
                });
            }
        }
    }

    Ok(Replay {
        key,
        updates,
        transfers,
        balance,
    })
}

/// Lowest running balance of `key` from a point in replay order onward.
///
/// The balance standing at `from` counts, as does the balance after every
/// later `done` entry. `Bound::Included(pos)` stands just before the entry at
/// `pos`, `Bound::Excluded(pos)` just after it. A movement of `q` inserted at
/// (or removed from) that point keeps every downstream balance non-negative
/// exactly when the result is at least `q`.
pub fn lowest_balance_from(
    key: LedgerKey,
    entries: &[LedgerTransaction],
    from: Bound<(DateTime<Utc>, u64)>,
) -> DomainResult<Decimal> {
    let replayed = replay(key, entries)?;
    let positions: Vec<(DateTime<Utc>, u64)> = {
        let mut done: Vec<&LedgerTransaction> = entries.iter().filter(|e| e.is_done()).collect();
        done.sort_by_key(|e| e.replay_position());
        done.iter().map(|e| e.replay_position()).collect()
    };

    let starts_here = |pos: &(DateTime<Utc>, u64)| match from {
        Bound::Included(at) => *pos >= at,
        Bound::Excluded(at) => *pos > at,
        Bound::Unbounded => true,
    };

    let mut standing = Decimal::ZERO;
    let mut lowest: Option<Decimal> = None;
    for (pos, update) in positions.iter().zip(&replayed.updates) {
        if lowest.is_none() && starts_here(pos) {
            lowest = Some(standing);
        }
        if let Some(low) = lowest.as_mut() {
            *low = (*low).min(update.remaining);
        }
        standing = update.remaining;
    }

    Ok(lowest.unwrap_or(standing))
}
