//! Filters and pagination for ledger queries.

use serde::{Deserialize, Serialize};

use stockbook_core::{ProductId, StoreId};
use stockbook_inventory::{LedgerKey, LedgerTransaction, TransactionStatus, TransactionType};

/// Pagination parameters (offset based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self::capped(limit, offset, Self::MAX_LIMIT)
    }

    /// Like `new`, with a caller-chosen cap (never above `MAX_LIMIT`).
    pub fn capped(limit: Option<u32>, offset: Option<u32>, cap: u32) -> Self {
        let cap = cap.clamp(1, Self::MAX_LIMIT);
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, cap),
            offset: offset.unwrap_or(0),
        }
    }

    pub fn all() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }

    pub(crate) fn window<T: Clone>(&self, items: &[T]) -> (Vec<T>, bool) {
        let start = (self.offset as usize).min(items.len());
        let end = start.saturating_add(self.limit as usize).min(items.len());
        (items[start..end].to_vec(), end < items.len())
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Filter criteria for transaction listings. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub product_id: Option<ProductId>,
    pub store_id: Option<StoreId>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &LedgerTransaction) -> bool {
        self.product_id.is_none_or(|p| p == tx.product_id)
            && self.store_id.is_none_or(|s| s == tx.from_store)
            && self.transaction_type.is_none_or(|t| t == tx.transaction_type)
            && self.status.is_none_or(|s| s == tx.status)
    }
}

/// Filter criteria for key listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFilter {
    pub product_id: Option<ProductId>,
    pub store_id: Option<StoreId>,
}

impl KeyFilter {
    pub fn matches(&self, key: &LedgerKey) -> bool {
        self.product_id.is_none_or(|p| p == key.product_id)
            && self.store_id.is_none_or(|s| s == key.store_id)
    }
}

/// One page of transactions, in replay order.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<LedgerTransaction>,
    /// Total number of matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// One page of distinct ledger keys, in key order.
#[derive(Debug, Clone, Serialize)]
pub struct KeyPage {
    pub keys: Vec<LedgerKey>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl KeyPage {
    /// Offset of the following page, if any.
    pub fn next_offset(&self) -> Option<u32> {
        self.has_more
            .then(|| self.pagination.offset.saturating_add(self.keys.len() as u32))
    }
}
