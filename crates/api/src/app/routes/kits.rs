use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Catalog listing, ordered by name.
pub async fn list_kits(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_kits().await {
        Ok(kits) => {
            let kits: Vec<dto::KitResponse> = kits.iter().map(dto::KitResponse::from).collect();
            Json(kits).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
