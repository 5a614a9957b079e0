//! Structured failure result of an order submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use promisekit_core::FieldErrors;

use crate::form::OrderForm;

pub const KIT_NOT_FOUND: &str = "Fitness kit not found";
pub const INVALID_COUPON: &str = "Invalid coupon code";
pub const COUPON_ALREADY_USED: &str =
    "This code has been used before and can no longer be used to place an order";
pub const INVALID_FIELDS: &str = "Please correct the errors below";
pub const SUBMISSION_FAILED: &str = "We could not place your order. Please try again.";
pub const ORDER_PLACED: &str = "Order placed successfully!";

/// How far a submission got: `Received -> CouponResolved -> Validated`.
/// A submission that gets past `Validated` is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStage {
    Received,
    CouponResolved,
    Validated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The slug no longer addresses a kit.
    KitNotFound,
    /// No coupon matches the normalized code.
    InvalidCoupon,
    /// The coupon exists but was consumed by an earlier order.
    CouponAlreadyUsed,
    /// One or more field rules failed.
    InvalidFields,
    /// The atomic commit lost a race (duplicate confirmation number, coupon
    /// consumed concurrently, vanished kit). Resubmitting is safe.
    CommitConflict,
    /// Storage could not be reached. Resubmitting is safe.
    Unavailable,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::KitNotFound => KIT_NOT_FOUND,
            RejectionReason::InvalidCoupon => INVALID_COUPON,
            RejectionReason::CouponAlreadyUsed => COUPON_ALREADY_USED,
            RejectionReason::InvalidFields => INVALID_FIELDS,
            RejectionReason::CommitConflict | RejectionReason::Unavailable => SUBMISSION_FAILED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::KitNotFound => "kit_not_found",
            RejectionReason::InvalidCoupon => "invalid_coupon",
            RejectionReason::CouponAlreadyUsed => "coupon_already_used",
            RejectionReason::InvalidFields => "validation_error",
            RejectionReason::CommitConflict => "commit_conflict",
            RejectionReason::Unavailable => "unavailable",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RejectionReason::CommitConflict | RejectionReason::Unavailable
        )
    }
}

/// Why a submission was not placed, plus everything needed to redisplay it.
///
/// `form` holds raw values when the submission was rejected before
/// normalization (kit or coupon failures) and normalized values afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", .reason.message())]
pub struct Rejection {
    pub reason: RejectionReason,
    pub stage: SubmissionStage,
    pub form: OrderForm,
    pub coupon_code_input: String,
    pub errors: FieldErrors,
}

impl Rejection {
    pub fn new(
        reason: RejectionReason,
        stage: SubmissionStage,
        form: OrderForm,
        coupon_code_input: impl Into<String>,
    ) -> Self {
        Self {
            reason,
            stage,
            form,
            coupon_code_input: coupon_code_input.into(),
            errors: FieldErrors::new(),
        }
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn message(&self) -> &'static str {
        self.reason.message()
    }
}
