//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Ledger entries are entities: their `remaining` and `status` change over
/// time, but they stay the same record.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing revision of the entity's mutable state.
    fn revision(&self) -> u64;
}
