//! Aggregate root trait for domain models that own a consistency boundary.

/// Aggregate root marker + minimal interface.
///
/// An order owns its lines: every line mutation goes through the order and bumps
/// the order's version.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state (+1 per persisted mutation).
    fn version(&self) -> u64;
}
