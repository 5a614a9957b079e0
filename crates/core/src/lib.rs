//! `promisekit-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog,
//! coupon and order crates (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod validation;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CouponId, KitId, OrderId};
pub use validation::{FieldError, FieldErrors};
pub use value_object::ValueObject;
