//! Order submission pipeline.
//!
//! ```text
//! submit(slug, coupon input, form)
//!   ↓
//! 1. Resolve kit by slug                  (missing -> KitNotFound)
//!   ↓
//! 2. Resolve coupon by normalized code    (missing -> InvalidCoupon, used -> CouponAlreadyUsed)
//!   ↓
//! 3. Normalize fields (always)
//!   ↓
//! 4. Validate every field, collect all    (any violation -> InvalidFields)
//!   ↓
//! 5. OrderStore::commit                   (atomic insert + coupon consumption)
//! ```
//!
//! Every failure, storage faults included, comes back as a [`Rejection`]; the
//! caller never sees a raw `StoreError` from `submit`.

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use promisekit_catalog::Kit;
use promisekit_core::{FieldErrors, OrderId};
use promisekit_orders::{
    NewOrder, Order, OrderForm, Rejection, RejectionReason, SubmissionStage, fields, messages,
};

use crate::store::{CouponLedger, KitCatalog, OrderStore, StoreError};

/// Orchestrates a single order-creation attempt against a store.
#[derive(Debug, Clone)]
pub struct OrderWorkflow<S> {
    store: S,
}

impl<S> OrderWorkflow<S>
where
    S: KitCatalog + CouponLedger + OrderStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Kit plus an empty form bound to it.
    pub async fn new_form(&self, slug: &str) -> Result<(Kit, OrderForm), StoreError> {
        let kit = self.store.find_by_slug(slug).await?;
        Ok((kit, OrderForm::default()))
    }

    pub async fn find_order(&self, id: OrderId) -> Result<Order, StoreError> {
        self.store.find_order(id).await
    }

    /// Run the full pipeline for one submission.
    #[instrument(skip(self, slug, coupon_code_input, form), fields(kit = %slug))]
    pub async fn submit(
        &self,
        slug: &str,
        coupon_code_input: &str,
        form: OrderForm,
    ) -> Result<Order, Rejection> {
        let reject = |reason, stage, form: OrderForm| {
            Rejection::new(reason, stage, form, coupon_code_input)
        };

        // 1) Kit
        let kit = match self.store.find_by_slug(slug).await {
            Ok(kit) => kit,
            Err(StoreError::NotFound) => {
                debug!("kit not found");
                return Err(reject(
                    RejectionReason::KitNotFound,
                    SubmissionStage::Received,
                    form,
                ));
            }
            Err(err) => {
                error!(error = %err, "kit lookup failed");
                return Err(reject(
                    RejectionReason::Unavailable,
                    SubmissionStage::Received,
                    form,
                ));
            }
        };

        // 2) Coupon; short-circuits before any field is touched.
        let coupon = match self.store.find_by_code(coupon_code_input).await {
            Ok(Some(coupon)) if coupon.is_unused() => coupon,
            Ok(Some(_)) => {
                debug!("coupon already used");
                return Err(reject(
                    RejectionReason::CouponAlreadyUsed,
                    SubmissionStage::Received,
                    form,
                ));
            }
            Ok(None) => {
                debug!("coupon not found");
                return Err(reject(
                    RejectionReason::InvalidCoupon,
                    SubmissionStage::Received,
                    form,
                ));
            }
            Err(err) => {
                error!(error = %err, "coupon lookup failed");
                return Err(reject(
                    RejectionReason::Unavailable,
                    SubmissionStage::Received,
                    form,
                ));
            }
        };

        // 3) + 4) Normalize, then validate everything.
        let form = form.normalized();
        let details = match form.validate() {
            Ok(details) => details,
            Err(errors) => {
                debug!(violations = errors.len(), "order form rejected");
                return Err(reject(
                    RejectionReason::InvalidFields,
                    SubmissionStage::CouponResolved,
                    form,
                )
                .with_errors(errors));
            }
        };

        // 5) Atomic commit.
        let new_order = NewOrder {
            id: OrderId::new(),
            kit_id: kit.id_typed(),
            coupon_id: coupon.id_typed(),
            details,
            created_at: Utc::now(),
        };

        match self.store.commit(new_order).await {
            Ok(order) => {
                info!(
                    order_id = %order.id_typed(),
                    confirmation = order.confirmation().value(),
                    "order placed"
                );
                Ok(order)
            }
            Err(StoreError::CouponAlreadyUsed) => {
                warn!("coupon consumed by a concurrent submission");
                let mut errors = FieldErrors::new();
                errors.add(fields::COUPON_CODE, messages::COUPON_USED);
                Err(reject(
                    RejectionReason::CouponAlreadyUsed,
                    SubmissionStage::Validated,
                    form,
                )
                .with_errors(errors))
            }
            Err(err @ (StoreError::Conflict(_) | StoreError::NotFound)) => {
                warn!(error = %err, "order commit conflict");
                Err(reject(
                    RejectionReason::CommitConflict,
                    SubmissionStage::Validated,
                    form,
                ))
            }
            Err(err) => {
                error!(error = %err, "order commit failed");
                Err(reject(
                    RejectionReason::Unavailable,
                    SubmissionStage::Validated,
                    form,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use promisekit_catalog::NewKit;
    use promisekit_coupons::{Coupon, CouponStatus};

    use crate::store::{CatalogAdmin, InMemoryStore};

    const SLUG: &str = "ultimate-home-gym";

    fn valid_form() -> OrderForm {
        OrderForm {
            first_name: "John".into(),
            last_name: "Doe".into(),
            address1: "123 Main St".into(),
            address2: "Apt 5".into(),
            city: "San Francisco".into(),
            state: "ca".into(),
            zip: "94102".into(),
            phone: "415-555-1234".into(),
            email: "John@Example.com".into(),
            description: String::new(),
        }
    }

    async fn setup(codes: &[&str]) -> OrderWorkflow<Arc<InMemoryStore>> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_kit(NewKit::new("Ultimate Home Gym", "Everything you need", SLUG))
            .await
            .unwrap();
        for code in codes {
            store.issue_coupon(code).await.unwrap();
        }
        OrderWorkflow::new(store)
    }

    async fn coupon(workflow: &OrderWorkflow<Arc<InMemoryStore>>, code: &str) -> Coupon {
        workflow.store().find_by_code(code).await.unwrap().unwrap()
    }

    async fn order_count(workflow: &OrderWorkflow<Arc<InMemoryStore>>) -> usize {
        workflow.store().recent_orders(usize::MAX).await.unwrap().len()
    }

    #[tokio::test]
    async fn successful_submission_places_order_and_consumes_coupon() {
        let workflow = setup(&["WELCOME2024"]).await;

        let order = workflow
            .submit(SLUG, " welcome2024 ", valid_form())
            .await
            .unwrap();

        assert_eq!(order.confirmation().value(), 1);
        assert_eq!(order.details().state, "CA");
        assert_eq!(order.details().phone, "4155551234");
        assert_eq!(order.details().email, "john@example.com");
        assert!(coupon(&workflow, "WELCOME2024").await.is_used());
        assert_eq!(workflow.find_order(order.id_typed()).await.unwrap(), order);
    }

    #[tokio::test]
    async fn confirmation_numbers_increase_by_one() {
        let workflow = setup(&["A1", "B2", "C3"]).await;

        let mut previous = 0;
        for code in ["A1", "B2", "C3"] {
            let order = workflow.submit(SLUG, code, valid_form()).await.unwrap();
            assert_eq!(order.confirmation().value(), previous + 1);
            previous = order.confirmation().value();
        }
    }

    #[tokio::test]
    async fn unknown_coupon_is_rejected_with_raw_form() {
        let workflow = setup(&["WELCOME2024"]).await;
        let form = OrderForm {
            first_name: String::new(),
            ..valid_form()
        };

        let rejection = workflow
            .submit(SLUG, "INVALID999", form.clone())
            .await
            .unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::InvalidCoupon);
        assert_eq!(rejection.message(), "Invalid coupon code");
        assert_eq!(rejection.stage, SubmissionStage::Received);
        assert_eq!(rejection.form, form);
        assert!(rejection.errors.is_empty());
        assert_eq!(order_count(&workflow).await, 0);
    }

    #[tokio::test]
    async fn used_coupon_is_rejected_and_stays_used() {
        let workflow = setup(&["ONCE"]).await;
        workflow.submit(SLUG, "ONCE", valid_form()).await.unwrap();

        let rejection = workflow
            .submit(SLUG, "once", valid_form())
            .await
            .unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::CouponAlreadyUsed);
        assert_eq!(
            rejection.message(),
            "This code has been used before and can no longer be used to place an order"
        );
        assert!(coupon(&workflow, "ONCE").await.is_used());
        assert_eq!(order_count(&workflow).await, 1);
    }

    #[tokio::test]
    async fn phone_with_letters_is_rejected_by_both_phone_rules() {
        let workflow = setup(&["FITNESS50"]).await;
        let form = OrderForm {
            phone: "415555abcd".into(),
            zip: String::new(),
            ..valid_form()
        };

        let rejection = workflow.submit(SLUG, "FITNESS50", form).await.unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::InvalidFields);
        assert_eq!(
            rejection.errors.on(fields::PHONE),
            vec!["must be exactly 10 digits", "must contain only digits"]
        );
        assert_eq!(
            rejection.errors.on(fields::ZIP),
            vec!["can't be blank", "must be 5 digits or ZIP+4"]
        );
        assert!(coupon(&workflow, "FITNESS50").await.is_unused());
    }

    #[tokio::test]
    async fn invalid_fields_keep_coupon_unused() {
        let workflow = setup(&["FITNESS50"]).await;
        let form = OrderForm {
            first_name: String::new(),
            state: " xx ".into(),
            ..valid_form()
        };

        let rejection = workflow.submit(SLUG, "FITNESS50", form).await.unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::InvalidFields);
        assert_eq!(rejection.message(), "Please correct the errors below");
        assert_eq!(rejection.stage, SubmissionStage::CouponResolved);
        assert_eq!(rejection.errors.on(fields::FIRST_NAME), vec!["can't be blank"]);
        assert_eq!(
            rejection.errors.on(fields::STATE),
            vec!["must be a valid US state"]
        );
        // Normalized values are what gets redisplayed.
        assert_eq!(rejection.form.state, "XX");
        assert_eq!(rejection.form.phone, "4155551234");

        assert!(coupon(&workflow, "FITNESS50").await.is_unused());
        assert_eq!(order_count(&workflow).await, 0);
    }

    #[tokio::test]
    async fn missing_kit_fails_safely() {
        let workflow = setup(&["WELCOME2024"]).await;

        let rejection = workflow
            .submit("non-existent", "WELCOME2024", valid_form())
            .await
            .unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::KitNotFound);
        assert!(coupon(&workflow, "WELCOME2024").await.is_unused());
        assert!(matches!(
            workflow.new_form("non-existent").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn new_form_is_empty_and_bound_to_kit() {
        let workflow = setup(&[]).await;
        let (kit, form) = workflow.new_form(SLUG).await.unwrap();
        assert_eq!(kit.slug().as_str(), SLUG);
        assert_eq!(form, OrderForm::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_submissions_on_one_coupon_yield_exactly_one_order() {
        let workflow = Arc::new(setup(&["RACE"]).await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let workflow = Arc::clone(&workflow);
            handles.push(tokio::spawn(async move {
                workflow.submit(SLUG, "RACE", valid_form()).await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(rejection) => assert!(matches!(
                    rejection.reason,
                    RejectionReason::CouponAlreadyUsed | RejectionReason::CommitConflict
                )),
            }
        }

        assert_eq!(placed, 1);
        assert_eq!(order_count(&workflow).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_get_distinct_confirmation_numbers() {
        let codes: Vec<String> = (0..20).map(|i| format!("CODE{i}")).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        let workflow = Arc::new(setup(&refs).await);

        let mut handles = Vec::new();
        for code in codes {
            let workflow = Arc::clone(&workflow);
            handles.push(tokio::spawn(async move {
                workflow.submit(SLUG, &code, valid_form()).await
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().confirmation().value());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=20).collect::<Vec<u64>>());
    }

    /// Store whose commit always loses, optionally failing every read too.
    struct FaultyStore {
        inner: InMemoryStore,
        reads_fail: bool,
        commit_error: fn() -> StoreError,
    }

    impl FaultyStore {
        fn read_fault(&self) -> Result<(), StoreError> {
            if self.reads_fail {
                return Err(StoreError::Backend("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KitCatalog for FaultyStore {
        async fn exists(&self, slug: &str) -> Result<bool, StoreError> {
            self.read_fault()?;
            self.inner.exists(slug).await
        }

        async fn find_by_slug(&self, slug: &str) -> Result<Kit, StoreError> {
            self.read_fault()?;
            self.inner.find_by_slug(slug).await
        }

        async fn list_ordered_by_name(&self) -> Result<Vec<Kit>, StoreError> {
            self.read_fault()?;
            self.inner.list_ordered_by_name().await
        }
    }

    #[async_trait]
    impl CouponLedger for FaultyStore {
        async fn find_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, StoreError> {
            self.read_fault()?;
            self.inner.find_by_code(raw_code).await
        }

        async fn list_by_status(&self, status: CouponStatus) -> Result<Vec<Coupon>, StoreError> {
            self.read_fault()?;
            self.inner.list_by_status(status).await
        }
    }

    #[async_trait]
    impl OrderStore for FaultyStore {
        async fn commit(&self, _order: NewOrder) -> Result<Order, StoreError> {
            Err((self.commit_error)())
        }

        async fn find_order(&self, id: OrderId) -> Result<Order, StoreError> {
            self.inner.find_order(id).await
        }

        async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
            self.inner.recent_orders(limit).await
        }
    }

    async fn faulty(reads_fail: bool, commit_error: fn() -> StoreError) -> OrderWorkflow<FaultyStore> {
        let inner = InMemoryStore::new();
        inner
            .insert_kit(NewKit::new("Ultimate Home Gym", "Everything you need", SLUG))
            .await
            .unwrap();
        inner.issue_coupon("WELCOME2024").await.unwrap();
        OrderWorkflow::new(FaultyStore {
            inner,
            reads_fail,
            commit_error,
        })
    }

    #[tokio::test]
    async fn commit_conflict_is_a_retryable_rejection() {
        let workflow = faulty(false, || StoreError::Conflict("duplicate confirmation".into())).await;

        let rejection = workflow
            .submit(SLUG, "WELCOME2024", valid_form())
            .await
            .unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::CommitConflict);
        assert_eq!(rejection.stage, SubmissionStage::Validated);
        assert!(rejection.reason.is_retryable());
        assert_eq!(
            rejection.message(),
            "We could not place your order. Please try again."
        );
        assert!(workflow.store().inner.find_by_code("WELCOME2024").await.unwrap().unwrap().is_unused());
    }

    #[tokio::test]
    async fn coupon_lost_at_commit_reports_field_error() {
        let workflow = faulty(false, || StoreError::CouponAlreadyUsed).await;

        let rejection = workflow
            .submit(SLUG, "WELCOME2024", valid_form())
            .await
            .unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::CouponAlreadyUsed);
        assert_eq!(
            rejection.errors.full_messages(),
            vec!["Coupon code has already been used".to_string()]
        );
    }

    #[tokio::test]
    async fn storage_outage_never_escapes_as_a_fault() {
        let workflow = faulty(true, || StoreError::Backend("down".into())).await;

        let rejection = workflow
            .submit(SLUG, "WELCOME2024", valid_form())
            .await
            .unwrap_err();

        assert_eq!(rejection.reason, RejectionReason::Unavailable);
        assert_eq!(rejection.stage, SubmissionStage::Received);
    }
}
