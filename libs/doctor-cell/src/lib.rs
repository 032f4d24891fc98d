pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{doctor_routes, slot_routes};
pub use services::availability::AvailabilityService;
pub use services::doctor::DoctorService;
pub use services::slots::{generate_slots, SlotService};
