use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Queue names. Post-booking effects fan out from the appointment queue to
/// the email queue.
pub const APPOINTMENT_QUEUE: &str = "appointment_notifications";
pub const EMAIL_QUEUE: &str = "email_delivery";

/// Work item emitted after a successful booking: provision a meeting and
/// hand the confirmation off to the email queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentJobPayload {
    pub appointment_id: Uuid,
    pub email: String,
    pub patient_name: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

/// Work item for the email queue, produced once the meeting link exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJobPayload {
    pub appointment_id: Uuid,
    pub to: String,
    pub patient_name: String,
    pub meeting_link: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Failed jobs may still move to Retrying; that transition is the retry
    /// path, not a resurrection of a terminal job.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (*self, target),
            (Queued, Processing)
                | (Retrying, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Retrying)
        )
    }
}

/// A queued job wrapping a typed payload. `attempt` counts completed
/// processing attempts, starting at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<P> {
    pub job_id: Uuid,
    pub payload: P,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub worker_id: Option<String>,
}

impl<P> Job<P> {
    pub fn new(payload: P, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            payload,
            status: JobStatus::Queued,
            attempt: 0,
            max_attempts,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            worker_id: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.attempt < self.max_attempts
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)` before re-running the
/// given attempt number.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Meeting provisioning is slow to recover; back off from a minute.
    pub fn appointment() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
        }
    }

    /// Mail providers bounce back quickly; back off from seconds.
    pub fn email() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(3),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(exponent)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub max_concurrent_jobs: u32,
    pub job_timeout_seconds: u64,
}

impl WorkerConfig {
    pub fn appointment() -> Self {
        Self {
            worker_id: format!("appointment-worker-{}", Uuid::new_v4()),
            max_concurrent_jobs: 1,
            job_timeout_seconds: 60,
        }
    }

    pub fn email() -> Self {
        Self {
            worker_id: format!("email-worker-{}", Uuid::new_v4()),
            max_concurrent_jobs: 5,
            job_timeout_seconds: 30,
        }
    }
}
