//! Stock availability decision.

use rust_decimal::Decimal;
use serde::Serialize;

use stockbook_core::{DomainError, DomainResult};

use crate::transaction::LedgerTransaction;

/// Answer to "can `requested` units leave this store right now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    pub requested: Decimal,
    pub remaining: Decimal,
    pub latest_transaction: Option<LedgerTransaction>,
}

impl Availability {
    /// Decide from the key's latest `done` entry.
    ///
    /// `None` means the key has no entries yet, which is zero stock. A request
    /// of zero is a balance peek and is always available.
    pub fn evaluate(
        requested: Decimal,
        latest: Option<LedgerTransaction>,
    ) -> DomainResult<Self> {
        if requested < Decimal::ZERO {
            return Err(DomainError::validation("requested quantity cannot be negative"));
        }

        let remaining = match &latest {
            None => Decimal::ZERO,
            Some(tx) => tx.remaining.ok_or_else(|| {
                DomainError::conflict(format!(
                    "latest entry {} has no recalculated balance",
                    tx.id
                ))
            })?,
        };

        let available = requested.is_zero() || remaining >= requested;

        Ok(Self {
            available,
            requested,
            remaining,
            latest_transaction: latest,
        })
    }

    /// Zero-stock answer for a key without entries.
    pub fn empty(requested: Decimal) -> DomainResult<Self> {
        Self::evaluate(requested, None)
    }

    /// How much is missing to satisfy the request (zero when available).
    pub fn shortfall(&self) -> Decimal {
        if self.available {
            Decimal::ZERO
        } else {
            self.requested - self.remaining
        }
    }
}
