pub mod ics;
pub mod models;
pub mod services;

pub use models::*;
pub use services::calendar::CalendarClient;
pub use services::mail::{render_confirmation, MailClient};
