//! Storage boundary for kits, coupons and orders.
//!
//! The workflow only sees these traits, so it runs unchanged against the
//! in-memory store (tests/dev) and the Postgres store (production).
//!
//! ## Atomic commit
//!
//! `OrderStore::commit` is the single unit that writes: it re-checks that the
//! coupon is still unused, assigns the next confirmation number, inserts the
//! order and marks the coupon used. Either all of it becomes visible or none
//! of it does. Implementations must serialize confirmation-number assignment
//! so that two concurrent commits never observe the same maximum.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use promisekit_catalog::{Kit, NewKit};
use promisekit_core::{CouponId, DomainError, FieldErrors, KitId, OrderId};
use promisekit_coupons::{Coupon, CouponStatus};
use promisekit_orders::{NewOrder, Order};

/// Message used when a delete would orphan placed orders.
pub const RESTRICTED_BY_ORDERS: &str = "Cannot delete record because dependent orders exist";

/// Storage operation error.
///
/// These are infrastructure errors as opposed to domain errors; the workflow
/// translates them into user-facing rejections.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness rule rejected an insert (duplicate kit name/slug or coupon code).
    #[error("{0}")]
    Duplicate(String),

    /// The record is still referenced and cannot be deleted.
    #[error("{0}")]
    Restricted(String),

    /// The data handed to the store failed its own rules.
    #[error("invalid record: {0}")]
    Invalid(FieldErrors),

    /// The coupon was already consumed when the commit re-checked it.
    #[error("coupon has already been used")]
    CouponAlreadyUsed,

    /// A concurrent writer won (duplicate confirmation number, coupon consumed
    /// between the check and the update, referenced row deleted).
    #[error("commit conflict: {0}")]
    Conflict(String),

    /// Storage unavailable or returned something unreadable.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Coupon codes have a single rule: not blank once normalized.
fn invalid_coupon_code(err: DomainError) -> StoreError {
    match err {
        DomainError::Validation(_) => {
            let mut errors = FieldErrors::new();
            errors.add("code", "can't be blank");
            StoreError::Invalid(errors)
        }
        other => StoreError::Backend(other.to_string()),
    }
}

/// Read access to the kit catalog.
#[async_trait]
pub trait KitCatalog: Send + Sync {
    async fn exists(&self, slug: &str) -> Result<bool, StoreError>;

    /// Exact slug match; `StoreError::NotFound` when absent.
    async fn find_by_slug(&self, slug: &str) -> Result<Kit, StoreError>;

    async fn list_ordered_by_name(&self) -> Result<Vec<Kit>, StoreError>;
}

/// Read access to coupons.
#[async_trait]
pub trait CouponLedger: Send + Sync {
    /// Normalizes `raw_code` before looking it up; blank input finds nothing.
    async fn find_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Coupons with the given status, ordered by code.
    async fn list_by_status(&self, status: CouponStatus) -> Result<Vec<Coupon>, StoreError>;
}

/// Order persistence, including the atomic commit.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Place the order and consume its coupon in one all-or-nothing step.
    ///
    /// Fails with `CouponAlreadyUsed` when the coupon was consumed before the
    /// commit could lock it, and with `Conflict` when a concurrent writer made
    /// the commit impossible.
    async fn commit(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn find_order(&self, id: OrderId) -> Result<Order, StoreError>;

    /// Newest first.
    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError>;
}

/// Catalog and coupon administration. Not used by the submission workflow.
#[async_trait]
pub trait CatalogAdmin: Send + Sync {
    async fn insert_kit(&self, kit: NewKit) -> Result<Kit, StoreError>;

    /// Fails with `Restricted` while any order references the kit.
    async fn delete_kit(&self, id: KitId) -> Result<(), StoreError>;

    /// Issue a new unused coupon. Codes are unique ignoring case.
    async fn issue_coupon(&self, raw_code: &str) -> Result<Coupon, StoreError>;

    /// Fails with `Restricted` once an order has consumed the coupon.
    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> KitCatalog for Arc<S>
where
    S: KitCatalog + ?Sized,
{
    async fn exists(&self, slug: &str) -> Result<bool, StoreError> {
        (**self).exists(slug).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Kit, StoreError> {
        (**self).find_by_slug(slug).await
    }

    async fn list_ordered_by_name(&self) -> Result<Vec<Kit>, StoreError> {
        (**self).list_ordered_by_name().await
    }
}

#[async_trait]
impl<S> CouponLedger for Arc<S>
where
    S: CouponLedger + ?Sized,
{
    async fn find_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, StoreError> {
        (**self).find_by_code(raw_code).await
    }

    async fn list_by_status(&self, status: CouponStatus) -> Result<Vec<Coupon>, StoreError> {
        (**self).list_by_status(status).await
    }
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn commit(&self, order: NewOrder) -> Result<Order, StoreError> {
        (**self).commit(order).await
    }

    async fn find_order(&self, id: OrderId) -> Result<Order, StoreError> {
        (**self).find_order(id).await
    }

    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        (**self).recent_orders(limit).await
    }
}

#[async_trait]
impl<S> CatalogAdmin for Arc<S>
where
    S: CatalogAdmin + ?Sized,
{
    async fn insert_kit(&self, kit: NewKit) -> Result<Kit, StoreError> {
        (**self).insert_kit(kit).await
    }

    async fn delete_kit(&self, id: KitId) -> Result<(), StoreError> {
        (**self).delete_kit(id).await
    }

    async fn issue_coupon(&self, raw_code: &str) -> Result<Coupon, StoreError> {
        (**self).issue_coupon(raw_code).await
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        (**self).delete_coupon(id).await
    }
}
