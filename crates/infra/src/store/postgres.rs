//! Postgres-backed store.
//!
//! ## Commit transaction
//!
//! `commit` runs in one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` on the coupon row, so concurrent commits for the
//!    same coupon queue behind each other
//! 2. `Coupon::mark_used` on the locked row (already used -> `CouponAlreadyUsed`)
//! 3. `pg_advisory_xact_lock` serializing confirmation-number assignment
//! 4. `COALESCE(MAX(order_confirmation), 0) + 1`, then the order insert
//! 5. `UPDATE coupon_codes ... WHERE status = 'unused'` (zero rows -> `Conflict`)
//!
//! The unique constraints on `orders.order_confirmation` and
//! `orders.coupon_code_id` back this up if the locking is ever bypassed.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` / `Duplicate` | Concurrent commit, duplicate kit or coupon |
//! | Database (foreign key violation) | `23503` | `Conflict` / `Restricted` | Kit deleted mid-commit, delete of a referenced row |
//! | Database (other) | Any other | `Backend` | Check constraint, syntax, etc. |
//! | RowNotFound | N/A | `NotFound` | `fetch_one` on a missing row |
//! | Other | N/A | `Backend` | Pool closed, network errors, etc. |

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use promisekit_catalog::{Kit, NewKit};
use promisekit_core::{CouponId, KitId, OrderId};
use promisekit_coupons::{Coupon, CouponCode, CouponStatus};
use promisekit_orders::{ConfirmationNumber, NewOrder, Order, ShippingDetails};

use super::{
    CatalogAdmin, CouponLedger, KitCatalog, OrderStore, RESTRICTED_BY_ORDERS, StoreError,
    invalid_coupon_code,
};

/// Advisory lock key guarding confirmation-number assignment.
const CONFIRMATION_LOCK_KEY: i64 = 0x6f72_6465_725f_6e6f;

const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";
const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";

/// Postgres-backed store for kits, coupons and orders.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self), err)]
    pub async fn kit_exists(&self, slug: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM kits WHERE slug = $1) AS present")
            .bind(slug)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("kit_exists", e))?;
        row.try_get("present")
            .map_err(|e| StoreError::Backend(format!("failed to read kit_exists: {e}")))
    }

    #[instrument(skip(self), err)]
    pub async fn load_kit_by_slug(&self, slug: &str) -> Result<Kit, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, slug, created_at
            FROM kits
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_kit_by_slug", e))?;

        match row {
            Some(row) => kit_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn load_kits(&self) -> Result<Vec<Kit>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, slug, created_at
            FROM kits
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_kits", e))?;

        rows.iter().map(kit_from_row).collect()
    }

    /// The raw code is never recorded; only whether it matched.
    #[instrument(skip(self, raw_code), fields(found = tracing::field::Empty), err)]
    pub async fn load_coupon_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, StoreError> {
        let code = CouponCode::normalize(raw_code);
        if code.is_empty() {
            Span::current().record("found", false);
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            SELECT id, code, status, created_at
            FROM coupon_codes
            WHERE code = $1
            "#,
        )
        .bind(&code)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_coupon_by_code", e))?;

        Span::current().record("found", row.is_some());
        row.as_ref().map(coupon_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_coupons_by_status(
        &self,
        status: CouponStatus,
    ) -> Result<Vec<Coupon>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, code, status, created_at
            FROM coupon_codes
            WHERE status = $1
            ORDER BY code ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_coupons_by_status", e))?;

        rows.iter().map(coupon_from_row).collect()
    }

    /// Place an order and consume its coupon atomically.
    #[instrument(
        skip(self, order),
        fields(
            order_id = %order.id,
            kit_id = %order.kit_id,
            coupon_id = %order.coupon_id,
            confirmation = tracing::field::Empty
        ),
        err
    )]
    pub async fn commit_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut coupon = match lock_coupon(&mut tx, order.coupon_id).await? {
            Some(coupon) => coupon,
            None => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Conflict(format!(
                    "coupon {} no longer exists",
                    order.coupon_id
                )));
            }
        };

        if coupon.mark_used().is_err() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::CouponAlreadyUsed);
        }

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CONFIRMATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("confirmation_lock", e))?;

        let current = current_max_confirmation(&mut tx).await?;
        let confirmation = ConfirmationNumber::next_after(current);
        Span::current().record("confirmation", confirmation.value());

        // Stored precision is microseconds; keep the returned record identical
        // to what a later read produces.
        let created_at = order.created_at.trunc_subsecs(6);
        let details = &order.details;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id,
                fitness_kit_id,
                coupon_code_id,
                order_confirmation,
                first_name,
                last_name,
                address1,
                address2,
                city,
                state,
                zip,
                phone,
                email,
                description,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(*order.id.as_uuid())
        .bind(*order.kit_id.as_uuid())
        .bind(*order.coupon_id.as_uuid())
        .bind(confirmation.value() as i64)
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(&details.address1)
        .bind(details.address2.as_deref())
        .bind(&details.city)
        .bind(&details.state)
        .bind(&details.zip)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(details.description.as_deref())
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!(
                    "concurrent commit detected: confirmation {} or coupon {} already taken",
                    confirmation, order.coupon_id
                ))
            } else {
                map_sqlx_error("insert_order", e)
            }
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE coupon_codes
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(*coupon.id_typed().as_uuid())
        .bind(coupon.status().as_str())
        .bind(CouponStatus::Unused.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("consume_coupon", e))?;

        if updated.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Conflict(format!(
                "coupon {} was consumed concurrently",
                order.coupon_id
            )));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Order::placed(
            NewOrder {
                created_at,
                ..order
            },
            confirmation,
        ))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn load_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query(&format!("{ORDER_COLUMNS} WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_order", e))?;

        match row {
            Some(row) => order_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn load_recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "{ORDER_COLUMNS} ORDER BY created_at DESC, order_confirmation DESC LIMIT $1"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_recent_orders", e))?;

        rows.iter().map(order_from_row).collect()
    }

    #[instrument(skip(self, new), fields(slug = %new.slug), err)]
    pub async fn create_kit(&self, new: NewKit) -> Result<Kit, StoreError> {
        let kit = Kit::create(KitId::new(), new, Utc::now().trunc_subsecs(6))
            .map_err(StoreError::Invalid)?;

        sqlx::query(
            r#"
            INSERT INTO kits (id, name, description, slug, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(*kit.id_typed().as_uuid())
        .bind(kit.name())
        .bind(kit.description())
        .bind(kit.slug().as_str())
        .bind(kit.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| match unique_constraint(&e) {
            Some("kits_name_key") => StoreError::Duplicate("name has already been taken".into()),
            Some("kits_slug_key") => StoreError::Duplicate("slug has already been taken".into()),
            _ => map_sqlx_error("create_kit", e),
        })?;

        Ok(kit)
    }

    #[instrument(skip(self), fields(kit_id = %id), err)]
    pub async fn remove_kit(&self, id: KitId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM kits WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_delete_error("remove_kit", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, raw_code), err)]
    pub async fn create_coupon(&self, raw_code: &str) -> Result<Coupon, StoreError> {
        let coupon = Coupon::issue(CouponId::new(), raw_code, Utc::now().trunc_subsecs(6))
            .map_err(invalid_coupon_code)?;

        sqlx::query(
            r#"
            INSERT INTO coupon_codes (id, code, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(*coupon.id_typed().as_uuid())
        .bind(coupon.code().as_str())
        .bind(coupon.status().as_str())
        .bind(coupon.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate("code has already been taken".into())
            } else {
                map_sqlx_error("create_coupon", e)
            }
        })?;

        Ok(coupon)
    }

    #[instrument(skip(self), fields(coupon_id = %id), err)]
    pub async fn remove_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM coupon_codes WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_delete_error("remove_coupon", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KitCatalog for PostgresStore {
    async fn exists(&self, slug: &str) -> Result<bool, StoreError> {
        self.kit_exists(slug).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Kit, StoreError> {
        self.load_kit_by_slug(slug).await
    }

    async fn list_ordered_by_name(&self) -> Result<Vec<Kit>, StoreError> {
        self.load_kits().await
    }
}

#[async_trait::async_trait]
impl CouponLedger for PostgresStore {
    async fn find_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, StoreError> {
        self.load_coupon_by_code(raw_code).await
    }

    async fn list_by_status(&self, status: CouponStatus) -> Result<Vec<Coupon>, StoreError> {
        self.load_coupons_by_status(status).await
    }
}

#[async_trait::async_trait]
impl OrderStore for PostgresStore {
    async fn commit(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.commit_order(order).await
    }

    async fn find_order(&self, id: OrderId) -> Result<Order, StoreError> {
        self.load_order(id).await
    }

    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        self.load_recent_orders(limit).await
    }
}

#[async_trait::async_trait]
impl CatalogAdmin for PostgresStore {
    async fn insert_kit(&self, kit: NewKit) -> Result<Kit, StoreError> {
        self.create_kit(kit).await
    }

    async fn delete_kit(&self, id: KitId) -> Result<(), StoreError> {
        self.remove_kit(id).await
    }

    async fn issue_coupon(&self, raw_code: &str) -> Result<Coupon, StoreError> {
        self.create_coupon(raw_code).await
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        self.remove_coupon(id).await
    }
}

const ORDER_COLUMNS: &str = r#"
    SELECT
        id,
        fitness_kit_id,
        coupon_code_id,
        order_confirmation,
        first_name,
        last_name,
        address1,
        address2,
        city,
        state,
        zip,
        phone,
        email,
        description,
        created_at
    FROM orders
"#;

async fn lock_coupon(
    tx: &mut Transaction<'_, Postgres>,
    coupon_id: CouponId,
) -> Result<Option<Coupon>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT id, code, status, created_at
        FROM coupon_codes
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(*coupon_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_coupon", e))?;

    row.as_ref().map(coupon_from_row).transpose()
}

async fn current_max_confirmation(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<Option<ConfirmationNumber>, StoreError> {
    let row = sqlx::query("SELECT COALESCE(MAX(order_confirmation), 0) AS current_max FROM orders")
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("current_max_confirmation", e))?;

    let current: i64 = row
        .try_get("current_max")
        .map_err(|e| StoreError::Backend(format!("failed to read current_max: {e}")))?;

    Ok(u64::try_from(current).ok().and_then(ConfirmationNumber::new))
}

fn kit_from_row(row: &PgRow) -> Result<Kit, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read kit row: {e}"));
    let id: uuid::Uuid = row.try_get("id").map_err(read)?;
    let name: String = row.try_get("name").map_err(read)?;
    let description: String = row.try_get("description").map_err(read)?;
    let slug: String = row.try_get("slug").map_err(read)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    Kit::restore(KitId::from_uuid(id), name, description, &slug, created_at)
        .map_err(|e| StoreError::Backend(format!("corrupt kit row {id}: {e}")))
}

fn coupon_from_row(row: &PgRow) -> Result<Coupon, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read coupon row: {e}"));
    let id: uuid::Uuid = row.try_get("id").map_err(read)?;
    let code: String = row.try_get("code").map_err(read)?;
    let status: String = row.try_get("status").map_err(read)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    let corrupt = |e: promisekit_core::DomainError| {
        StoreError::Backend(format!("corrupt coupon row {id}: {e}"))
    };
    let status: CouponStatus = status.parse().map_err(corrupt)?;
    Coupon::restore(CouponId::from_uuid(id), &code, status, created_at).map_err(corrupt)
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read order row: {e}"));
    let id: uuid::Uuid = row.try_get("id").map_err(read)?;
    let kit_id: uuid::Uuid = row.try_get("fitness_kit_id").map_err(read)?;
    let coupon_id: uuid::Uuid = row.try_get("coupon_code_id").map_err(read)?;
    let confirmation: i64 = row.try_get("order_confirmation").map_err(read)?;

    let confirmation = u64::try_from(confirmation)
        .ok()
        .and_then(ConfirmationNumber::new)
        .ok_or_else(|| {
            StoreError::Backend(format!(
                "corrupt order row {id}: confirmation {confirmation} is not positive"
            ))
        })?;

    let details = ShippingDetails {
        first_name: row.try_get("first_name").map_err(read)?,
        last_name: row.try_get("last_name").map_err(read)?,
        address1: row.try_get("address1").map_err(read)?,
        address2: row.try_get("address2").map_err(read)?,
        city: row.try_get("city").map_err(read)?,
        state: row.try_get("state").map_err(read)?,
        zip: row.try_get("zip").map_err(read)?,
        phone: row.try_get("phone").map_err(read)?,
        email: row.try_get("email").map_err(read)?,
        description: row.try_get("description").map_err(read)?,
    };

    Ok(Order::placed(
        NewOrder {
            id: OrderId::from_uuid(id),
            kit_id: KitId::from_uuid(kit_id),
            coupon_id: CouponId::from_uuid(coupon_id),
            details,
            created_at: row.try_get("created_at").map_err(read)?,
        },
        confirmation,
    ))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some(SQLSTATE_UNIQUE_VIOLATION) | Some(SQLSTATE_FOREIGN_KEY_VIOLATION) => {
                    StoreError::Conflict(msg)
                }
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// Deletes blocked by `ON DELETE RESTRICT` report the restriction itself.
fn map_delete_error(operation: &str, err: sqlx::Error) -> StoreError {
    if sqlstate(&err).as_deref() == Some(SQLSTATE_FOREIGN_KEY_VIOLATION) {
        return StoreError::Restricted(RESTRICTED_BY_ORDERS.to_string());
    }
    map_sqlx_error(operation, err)
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(SQLSTATE_UNIQUE_VIOLATION)
}

/// Name of the violated unique constraint, if that is what failed.
fn unique_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if is_unique_violation(err) => db_err.constraint(),
        _ => None,
    }
}
