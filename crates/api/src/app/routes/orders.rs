use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use promisekit_core::OrderId;
use promisekit_infra::StoreError;
use promisekit_orders::outcome::ORDER_PLACED;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Gate every slug route on the kit existing at request time.
async fn ensure_kit(services: &AppServices, slug: &str) -> Result<(), axum::response::Response> {
    match services.kit_exists(slug).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(errors::kit_not_found()),
        Err(e) => Err(errors::store_error_to_response(e)),
    }
}

pub async fn new_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = ensure_kit(&services, &slug).await {
        return resp;
    }

    match services.new_form(&slug).await {
        Ok((kit, order)) => Json(dto::NewOrderResponse {
            kit: dto::KitResponse::from(&kit),
            order,
        })
        .into_response(),
        // Deleted between the gate and the read.
        Err(StoreError::NotFound) => errors::kit_not_found(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    if let Err(resp) = ensure_kit(&services, &slug).await {
        return resp;
    }

    // Parsed only once the slug is known to address a kit.
    let body: dto::SubmitOrderRequest = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string());
        }
    };

    match services
        .submit(&slug, &body.coupon_code_input, body.order)
        .await
    {
        Ok(order) => {
            let location = format!("/orders/{}", order.id_typed());
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(dto::OrderPlacedResponse {
                    notice: ORDER_PLACED,
                    order: dto::OrderResponse::from(&order),
                }),
            )
                .into_response()
        }
        Err(rejection) => errors::rejection_to_response(rejection),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match id.parse::<OrderId>() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match services.find_order(id).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(StoreError::NotFound) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "Order not found")
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
