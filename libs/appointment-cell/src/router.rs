use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Booking is public; the dashboard routes require a doctor identity.
pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route("/", post(handlers::book_appointment));

    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/", patch(handlers::update_appointments))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
