use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use promisekit_infra::StoreError;
use promisekit_orders::{Rejection, RejectionReason};

use crate::app::dto::RejectionBody;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn kit_not_found() -> axum::response::Response {
    json_error(
        StatusCode::NOT_FOUND,
        RejectionReason::KitNotFound.code(),
        RejectionReason::KitNotFound.message(),
    )
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg),
        StoreError::Restricted(msg) => json_error(StatusCode::CONFLICT, "restricted", msg),
        StoreError::Invalid(errors) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            errors.to_string(),
        ),
        StoreError::CouponAlreadyUsed | StoreError::Conflict(_) => {
            json_error(StatusCode::CONFLICT, "conflict", err.to_string())
        }
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "storage backend error");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "storage is unavailable",
            )
        }
    }
}

pub fn rejection_to_response(rejection: Rejection) -> axum::response::Response {
    let status = match rejection.reason {
        RejectionReason::KitNotFound => StatusCode::NOT_FOUND,
        RejectionReason::InvalidCoupon
        | RejectionReason::CouponAlreadyUsed
        | RejectionReason::InvalidFields => StatusCode::UNPROCESSABLE_ENTITY,
        RejectionReason::CommitConflict => StatusCode::CONFLICT,
        RejectionReason::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, axum::Json(RejectionBody::from(rejection))).into_response()
}
