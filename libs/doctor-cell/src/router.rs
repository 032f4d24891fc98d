use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Doctor-facing routes: profile, availability windows and slot management.
pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/profile", get(handlers::get_my_profile))
        .route("/profile", patch(handlers::update_my_profile))
        .route("/availability", post(handlers::create_availability))
        .route("/availability", get(handlers::list_availability))
        .route(
            "/availability/{availability_id}",
            delete(handlers::delete_availability),
        )
        .route("/slots/generate", post(handlers::generate_slots))
        .route("/slots/{slot_id}", delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

/// Patient-facing slot discovery. No authentication: browsing open slots is
/// the entry point of the booking flow.
pub fn slot_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::search_slots))
        .with_state(state)
}
