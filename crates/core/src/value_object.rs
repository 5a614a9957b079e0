//! Value object trait: equality by value, not identity.
//!
//! Value objects carry no identity. A `KitSlug` or a normalized `CouponCode`
//! is defined entirely by its text, and two instances with the same text are
//! interchangeable.

/// Marker trait for value objects.
///
/// Implementors are immutable once constructed; their constructors are the
/// only place where normalization and format rules are enforced, so a value
/// that exists is a value that is valid.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct KitSlug(String);
///
/// impl ValueObject for KitSlug {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
