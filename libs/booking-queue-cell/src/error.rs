use thiserror::Error;

use notification_cell::NotificationError;
use shared_database::StoreError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Maximum attempts ({max_attempts}) exceeded for job {job_id}")]
    MaxRetriesExceeded { job_id: String, max_attempts: u32 },

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Job processing failed: {0}")]
    Processing(String),
}
