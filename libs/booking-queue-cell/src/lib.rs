pub mod error;
pub mod models;
pub mod services;

pub use error::QueueError;
pub use models::*;
pub use services::producer::NotificationProducer;
pub use services::queue::RedisJobQueue;
pub use services::worker::{AppointmentWorker, EmailWorker};
