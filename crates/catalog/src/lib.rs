//! Fitness kit catalog domain module.
//!
//! Kits are created by catalog administration and are read-mostly afterwards;
//! this crate holds the kit entity and its data rules (no IO, no storage).

pub mod kit;

pub use kit::{Kit, KitSlug, NewKit};
