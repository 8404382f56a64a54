//! Inventory ledger domain module.
//!
//! This crate contains the business rules of the stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - `transaction`: ledger entries, their types/status and input validation
//! - `measurement`: main/sub unit normalization
//! - `replay`: running-balance derivation over an ordered ledger
//! - `availability`: the "is there enough stock" decision

pub mod availability;
pub mod measurement;
pub mod replay;
pub mod transaction;

pub use availability::Availability;
pub use measurement::{NormalizedQuantity, ProductUnits};
pub use replay::{BalanceUpdate, Replay, TransferBalance, lowest_balance_from, replay};
pub use transaction::{
    LedgerKey, LedgerTransaction, MeasurementType, NewTransaction, RecordTransaction,
    TransactionStatus, TransactionType, ValidatedRecord,
};
