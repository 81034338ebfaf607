//! Entity trait: a stable identity that outlives every state change.

/// Something tracked by identity rather than by value.
///
/// A stock record keeps its product id while its quantities and location
/// move around; two records with equal quantities are still different records.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
