//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Quantities and per-unit states are value objects: an inventory emits a fresh
/// snapshot on every change instead of handing out references to live state,
/// and two snapshots with the same counts and flags are interchangeable.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Counts {
///     actual: u32,
///     broken: u32,
/// }
///
/// impl ValueObject for Counts {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
