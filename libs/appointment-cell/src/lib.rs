pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::appointment_routes;
pub use services::booking::BookingService;
pub use services::lifecycle::{valid_transitions, validate_transition};
