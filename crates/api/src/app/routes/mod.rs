use axum::{routing::get, Router};

pub mod kits;
pub mod orders;

/// Router for every public endpoint.
///
/// Static paths (`/kits`, `/orders/:id`) take priority over the kit slug
/// catch-all.
pub fn router() -> Router {
    Router::new()
        .route("/kits", get(kits::list_kits))
        .route("/orders/:id", get(orders::get_order))
        .route("/:slug", get(orders::new_order).post(orders::create_order))
}
