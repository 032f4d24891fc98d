pub mod producer;
pub mod queue;
pub mod worker;

pub use producer::NotificationProducer;
pub use queue::RedisJobQueue;
pub use worker::{AppointmentWorker, EmailWorker};
