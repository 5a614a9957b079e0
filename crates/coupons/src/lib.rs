//! Coupon code domain module.
//!
//! Coupons are single-use: they start `unused` and flip to `used` exactly once,
//! as part of placing an order. Persistence of that transition is the order
//! store's job; this crate only decides whether it is allowed.

pub mod coupon;

pub use coupon::{Coupon, CouponCode, CouponStatus};
