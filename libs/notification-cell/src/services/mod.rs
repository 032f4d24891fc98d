pub mod calendar;
pub mod mail;

pub use calendar::CalendarClient;
pub use mail::{render_confirmation, MailClient};
