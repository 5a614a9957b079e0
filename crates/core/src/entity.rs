//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Kits, coupons and orders are compared by identity; two orders with the same
/// contact details are still different orders.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
