//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Catalog materials are entities: two snapshots with the same id describe the
/// same physical stock even when their awaited units differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
