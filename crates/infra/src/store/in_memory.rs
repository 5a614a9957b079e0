use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use promisekit_catalog::{Kit, NewKit};
use promisekit_core::{CouponId, KitId, OrderId};
use promisekit_coupons::{Coupon, CouponCode, CouponStatus};
use promisekit_orders::{ConfirmationNumber, NewOrder, Order};

use super::{
    CatalogAdmin, CouponLedger, KitCatalog, OrderStore, RESTRICTED_BY_ORDERS, StoreError,
    invalid_coupon_code,
};

#[derive(Debug, Default)]
struct State {
    kits: HashMap<KitId, Kit>,
    coupons: HashMap<CouponId, Coupon>,
    /// Commit order.
    orders: Vec<Order>,
}

impl State {
    fn max_confirmation(&self) -> Option<ConfirmationNumber> {
        self.orders.iter().map(Order::confirmation).max()
    }
}

/// In-memory store for kits, coupons and orders.
///
/// Intended for tests/dev. Every operation takes the single lock, so `commit`
/// is atomic with respect to every other reader and writer.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl KitCatalog for InMemoryStore {
    async fn exists(&self, slug: &str) -> Result<bool, StoreError> {
        let state = self.read()?;
        Ok(state.kits.values().any(|k| k.slug().as_str() == slug))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Kit, StoreError> {
        let state = self.read()?;
        state
            .kits
            .values()
            .find(|k| k.slug().as_str() == slug)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_ordered_by_name(&self) -> Result<Vec<Kit>, StoreError> {
        let state = self.read()?;
        let mut kits: Vec<Kit> = state.kits.values().cloned().collect();
        kits.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(kits)
    }
}

#[async_trait]
impl CouponLedger for InMemoryStore {
    async fn find_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, StoreError> {
        let code = CouponCode::normalize(raw_code);
        if code.is_empty() {
            return Ok(None);
        }
        let state = self.read()?;
        Ok(state
            .coupons
            .values()
            .find(|c| c.code().as_str() == code)
            .cloned())
    }

    async fn list_by_status(&self, status: CouponStatus) -> Result<Vec<Coupon>, StoreError> {
        let state = self.read()?;
        let mut coupons: Vec<Coupon> = state
            .coupons
            .values()
            .filter(|c| c.status() == status)
            .cloned()
            .collect();
        coupons.sort_by(|a, b| a.code().as_str().cmp(b.code().as_str()));
        Ok(coupons)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn commit(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut state = self.write()?;

        if !state.kits.contains_key(&order.kit_id) {
            return Err(StoreError::Conflict(format!(
                "kit {} no longer exists",
                order.kit_id
            )));
        }
        if state.orders.iter().any(|o| o.id_typed() == order.id) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id
            )));
        }

        let mut coupon = state
            .coupons
            .get(&order.coupon_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Conflict(format!("coupon {} no longer exists", order.coupon_id))
            })?;
        if state.orders.iter().any(|o| o.coupon_id() == order.coupon_id) {
            return Err(StoreError::CouponAlreadyUsed);
        }
        coupon
            .mark_used()
            .map_err(|_| StoreError::CouponAlreadyUsed)?;

        let confirmation = ConfirmationNumber::next_after(state.max_confirmation());
        let placed = Order::placed(order, confirmation);

        state.coupons.insert(coupon.id_typed(), coupon);
        state.orders.push(placed.clone());
        Ok(placed)
    }

    async fn find_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let state = self.read()?;
        state
            .orders
            .iter()
            .find(|o| o.id_typed() == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let state = self.read()?;
        let mut orders = state.orders.clone();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.confirmation().cmp(&a.confirmation()))
        });
        orders.truncate(limit);
        Ok(orders)
    }
}

#[async_trait]
impl CatalogAdmin for InMemoryStore {
    async fn insert_kit(&self, kit: NewKit) -> Result<Kit, StoreError> {
        let kit = Kit::create(KitId::new(), kit, Utc::now()).map_err(StoreError::Invalid)?;
        let mut state = self.write()?;

        if state.kits.values().any(|k| k.name() == kit.name()) {
            return Err(StoreError::Duplicate("name has already been taken".to_string()));
        }
        if state.kits.values().any(|k| k.slug() == kit.slug()) {
            return Err(StoreError::Duplicate("slug has already been taken".to_string()));
        }

        state.kits.insert(kit.id_typed(), kit.clone());
        Ok(kit)
    }

    async fn delete_kit(&self, id: KitId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.kits.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if state.orders.iter().any(|o| o.kit_id() == id) {
            return Err(StoreError::Restricted(RESTRICTED_BY_ORDERS.to_string()));
        }
        state.kits.remove(&id);
        Ok(())
    }

    async fn issue_coupon(&self, raw_code: &str) -> Result<Coupon, StoreError> {
        let coupon =
            Coupon::issue(CouponId::new(), raw_code, Utc::now()).map_err(invalid_coupon_code)?;
        let mut state = self.write()?;

        if state.coupons.values().any(|c| c.code() == coupon.code()) {
            return Err(StoreError::Duplicate("code has already been taken".to_string()));
        }

        state.coupons.insert(coupon.id_typed(), coupon.clone());
        Ok(coupon)
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.coupons.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if state.orders.iter().any(|o| o.coupon_id() == id) {
            return Err(StoreError::Restricted(RESTRICTED_BY_ORDERS.to_string()));
        }
        state.coupons.remove(&id);
        Ok(())
    }
}
