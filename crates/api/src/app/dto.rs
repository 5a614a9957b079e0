use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promisekit_catalog::Kit;
use promisekit_core::FieldErrors;
use promisekit_orders::{Order, OrderForm, Rejection, SubmissionStage};

// -------------------------
// Request DTOs
// -------------------------

/// Order form fields plus the coupon code, all at the top level.
#[derive(Debug, Deserialize)]
pub struct SubmitOrderRequest {
    #[serde(default)]
    pub coupon_code_input: String,
    #[serde(flatten)]
    pub order: OrderForm,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct KitResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Kit> for KitResponse {
    fn from(kit: &Kit) -> Self {
        Self {
            id: kit.id_typed().to_string(),
            name: kit.name().to_string(),
            description: kit.description().to_string(),
            slug: kit.slug().to_string(),
            created_at: kit.created_at(),
        }
    }
}

/// Empty form bound to a kit.
#[derive(Debug, Serialize)]
pub struct NewOrderResponse {
    pub kit: KitResponse,
    pub order: OrderForm,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub fitness_kit_id: String,
    pub coupon_code_id: String,
    pub order_confirmation: u64,
    pub formatted_confirmation: String,
    pub full_name: String,
    pub formatted_phone: String,
    pub full_address: String,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let d = order.details();
        Self {
            id: order.id_typed().to_string(),
            fitness_kit_id: order.kit_id().to_string(),
            coupon_code_id: order.coupon_id().to_string(),
            order_confirmation: order.confirmation().value(),
            formatted_confirmation: order.formatted_confirmation(),
            full_name: order.full_name(),
            formatted_phone: order.formatted_phone(),
            full_address: order.full_address(),
            first_name: d.first_name.clone(),
            last_name: d.last_name.clone(),
            address1: d.address1.clone(),
            address2: d.address2.clone(),
            city: d.city.clone(),
            state: d.state.clone(),
            zip: d.zip.clone(),
            phone: d.phone.clone(),
            email: d.email.clone(),
            description: d.description.clone(),
            created_at: order.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPlacedResponse {
    pub notice: &'static str,
    pub order: OrderResponse,
}

/// Body for a rejected submission: enough to redisplay the form.
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub error: &'static str,
    pub message: &'static str,
    pub stage: SubmissionStage,
    pub retryable: bool,
    pub errors: FieldErrors,
    pub full_messages: Vec<String>,
    pub coupon_code_input: String,
    pub order: OrderForm,
}

impl From<Rejection> for RejectionBody {
    fn from(rejection: Rejection) -> Self {
        Self {
            error: rejection.reason.code(),
            message: rejection.reason.message(),
            stage: rejection.stage,
            retryable: rejection.reason.is_retryable(),
            full_messages: rejection.errors.full_messages(),
            errors: rejection.errors,
            coupon_code_input: rejection.coupon_code_input,
            order: rejection.form,
        }
    }
}
