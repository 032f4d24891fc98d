use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::QueueError;
use crate::models::{AppointmentJobPayload, Job, RetryPolicy, APPOINTMENT_QUEUE};
use crate::services::queue::RedisJobQueue;

/// Producer side of the post-booking pipeline: hands freshly booked
/// appointments to the appointment queue.
pub struct NotificationProducer {
    queue: RedisJobQueue,
}

impl NotificationProducer {
    pub async fn new(config: &AppConfig) -> Result<Self, QueueError> {
        let queue = RedisJobQueue::new(config, APPOINTMENT_QUEUE).await?;
        Ok(Self { queue })
    }

    pub async fn enqueue_booking_notification(
        &self,
        payload: AppointmentJobPayload,
    ) -> Result<Uuid, QueueError> {
        let appointment_id = payload.appointment_id;
        let job = Job::new(payload, RetryPolicy::appointment().max_attempts);

        self.queue.enqueue(&job).await?;

        info!(
            "Notification job {} queued for appointment {}",
            job.job_id, appointment_id
        );
        Ok(job.job_id)
    }
}
