pub mod booking;
pub mod lifecycle;

pub use booking::BookingService;
pub use lifecycle::{valid_transitions, validate_transition};
