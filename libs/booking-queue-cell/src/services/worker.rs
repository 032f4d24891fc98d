use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

use notification_cell::ics;
use notification_cell::models::{EmailMessage, IcsAttachment};
use notification_cell::{render_confirmation, CalendarClient, MailClient};
use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::error::QueueError;
use crate::models::{
    AppointmentJobPayload, EmailJobPayload, Job, JobStatus, RetryPolicy, WorkerConfig,
};
use crate::services::queue::RedisJobQueue;

/// Strip a display name from a `Name <address>` sender.
fn bare_address(from: &str) -> String {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if end > start => from[start + 1..end].to_string(),
        _ => from.trim().to_string(),
    }
}

/// Consumes the appointment queue: provisions a video meeting, attaches the
/// link to the appointment row, then hands the confirmation to the email
/// queue. The appointment's status is untouched; a missing link never
/// blocks the booking.
pub struct AppointmentWorker {
    config: WorkerConfig,
    retry: RetryPolicy,
    queue: Arc<RedisJobQueue>,
    email_queue: Arc<RedisJobQueue>,
    store: Arc<PostgrestClient>,
    calendar: Arc<CalendarClient>,
    is_shutdown: Arc<RwLock<bool>>,
}

impl AppointmentWorker {
    pub fn new(
        app_config: &AppConfig,
        config: WorkerConfig,
        queue: Arc<RedisJobQueue>,
        email_queue: Arc<RedisJobQueue>,
    ) -> Result<Self, QueueError> {
        let calendar = Arc::new(CalendarClient::new(app_config)?);

        Ok(Self {
            config,
            retry: RetryPolicy::appointment(),
            queue,
            email_queue,
            store: Arc::new(PostgrestClient::new(app_config)),
            calendar,
            is_shutdown: Arc::new(RwLock::new(false)),
        })
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), QueueError> {
        info!("Starting appointment worker {}", self.config.worker_id);

        let mut handles = Vec::new();
        for i in 0..self.config.max_concurrent_jobs {
            let worker = self.clone_for_worker();
            let worker_name = format!("{}-{}", self.config.worker_id, i);

            handles.push(tokio::spawn(async move {
                worker.worker_loop(worker_name).await
            }));
        }

        tokio::select! {
            _ = self.wait_for_shutdown() => {
                info!("Shutdown signal received, stopping worker {}", self.config.worker_id);
            }
            _ = futures::future::try_join_all(handles) => {
                warn!("All appointment worker loops completed unexpectedly");
            }
        }

        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }

    async fn worker_loop(&self, worker_name: String) -> Result<(), QueueError> {
        debug!("Worker loop started: {}", worker_name);

        loop {
            if *self.is_shutdown.read().await {
                debug!("Worker {} received shutdown signal", worker_name);
                break;
            }

            match self.queue.dequeue::<AppointmentJobPayload>(&worker_name).await {
                Ok(Some(job)) => {
                    if let Err(e) = self.process_job(job, &worker_name).await {
                        error!("Worker {} failed to process job: {}", worker_name, e);
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    error!("Worker {} failed to dequeue job: {}", worker_name, e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.job_id))]
    async fn process_job(
        &self,
        job: Job<AppointmentJobPayload>,
        worker_name: &str,
    ) -> Result<(), QueueError> {
        info!(
            "Processing appointment job {} with worker {}",
            job.job_id, worker_name
        );

        let job_timeout = Duration::from_secs(self.config.job_timeout_seconds);
        let result = timeout(job_timeout, self.handle_appointment(&job.payload)).await;

        match result {
            Ok(Ok(())) => {
                self.queue
                    .update_status::<AppointmentJobPayload>(job.job_id, JobStatus::Completed, None)
                    .await?;
                info!("Appointment job {} completed", job.job_id);
            }
            Ok(Err(e)) => {
                self.fail_and_maybe_retry(&job, e.to_string()).await?;
            }
            Err(_) => {
                let msg = format!(
                    "Job timed out after {} seconds",
                    self.config.job_timeout_seconds
                );
                self.fail_and_maybe_retry(&job, msg).await?;
            }
        }

        Ok(())
    }

    async fn fail_and_maybe_retry(
        &self,
        job: &Job<AppointmentJobPayload>,
        message: String,
    ) -> Result<(), QueueError> {
        error!("Appointment job {} failed: {}", job.job_id, message);

        self.queue
            .update_status::<AppointmentJobPayload>(job.job_id, JobStatus::Failed, Some(message))
            .await?;

        if job.attempt < job.max_attempts {
            let delay = self.retry.delay_for(job.attempt);
            warn!(
                "Appointment job {} will be retried in {:?} (attempt {}/{})",
                job.job_id, delay, job.attempt, job.max_attempts
            );
            tokio::time::sleep(delay).await;
            self.queue
                .retry_job::<AppointmentJobPayload>(job.job_id)
                .await?;
        }

        Ok(())
    }

    /// The meeting's conference request is keyed by the appointment id, so
    /// a retried job reuses the provider-side conference instead of leaking
    /// one per attempt.
    async fn handle_appointment(
        &self,
        payload: &AppointmentJobPayload,
    ) -> Result<(), QueueError> {
        let summary = format!("Dental appointment for {}", payload.patient_name);
        let description = format!(
            "Video consultation booked by {} ({})",
            payload.patient_name, payload.email
        );

        let meeting = self
            .calendar
            .create_meeting(
                &summary,
                &description,
                payload.slot_start,
                payload.slot_end,
                &payload.email,
                &payload.appointment_id.to_string(),
            )
            .await?;

        let path = format!("/rest/v1/appointments?id=eq.{}", payload.appointment_id);
        let _: Vec<Value> = self
            .store
            .request_with_prefer(
                Method::PATCH,
                &path,
                None,
                Some(json!({ "meet_link": meeting.meet_link })),
                Some("return=representation"),
            )
            .await?;

        debug!(
            "Meet link attached to appointment {}",
            payload.appointment_id
        );

        let email_job = Job::new(
            EmailJobPayload {
                appointment_id: payload.appointment_id,
                to: payload.email.clone(),
                patient_name: payload.patient_name.clone(),
                meeting_link: meeting.meet_link,
                slot_start: payload.slot_start,
                slot_end: payload.slot_end,
            },
            RetryPolicy::email().max_attempts,
        );
        self.email_queue.enqueue(&email_job).await?;

        Ok(())
    }

    async fn wait_for_shutdown(&self) {
        loop {
            if *self.is_shutdown.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn clone_for_worker(&self) -> Self {
        Self {
            config: self.config.clone(),
            retry: self.retry,
            queue: Arc::clone(&self.queue),
            email_queue: Arc::clone(&self.email_queue),
            store: Arc::clone(&self.store),
            calendar: Arc::clone(&self.calendar),
            is_shutdown: Arc::clone(&self.is_shutdown),
        }
    }
}

/// Consumes the email queue and delivers booking confirmations with a
/// calendar invite attached.
pub struct EmailWorker {
    config: WorkerConfig,
    retry: RetryPolicy,
    queue: Arc<RedisJobQueue>,
    mail: Arc<MailClient>,
    organizer_address: String,
    is_shutdown: Arc<RwLock<bool>>,
}

impl EmailWorker {
    pub fn new(
        app_config: &AppConfig,
        config: WorkerConfig,
        queue: Arc<RedisJobQueue>,
    ) -> Result<Self, QueueError> {
        let mail = Arc::new(MailClient::new(app_config)?);

        Ok(Self {
            config,
            retry: RetryPolicy::email(),
            queue,
            mail,
            organizer_address: bare_address(&app_config.mail_from_address),
            is_shutdown: Arc::new(RwLock::new(false)),
        })
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), QueueError> {
        info!("Starting email worker {}", self.config.worker_id);

        let mut handles = Vec::new();
        for i in 0..self.config.max_concurrent_jobs {
            let worker = self.clone_for_worker();
            let worker_name = format!("{}-{}", self.config.worker_id, i);

            handles.push(tokio::spawn(async move {
                worker.worker_loop(worker_name).await
            }));
        }

        tokio::select! {
            _ = self.wait_for_shutdown() => {
                info!("Shutdown signal received, stopping worker {}", self.config.worker_id);
            }
            _ = futures::future::try_join_all(handles) => {
                warn!("All email worker loops completed unexpectedly");
            }
        }

        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }

    async fn worker_loop(&self, worker_name: String) -> Result<(), QueueError> {
        debug!("Worker loop started: {}", worker_name);

        loop {
            if *self.is_shutdown.read().await {
                debug!("Worker {} received shutdown signal", worker_name);
                break;
            }

            match self.queue.dequeue::<EmailJobPayload>(&worker_name).await {
                Ok(Some(job)) => {
                    if let Err(e) = self.process_job(job, &worker_name).await {
                        error!("Worker {} failed to process job: {}", worker_name, e);
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    error!("Worker {} failed to dequeue job: {}", worker_name, e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.job_id))]
    async fn process_job(
        &self,
        job: Job<EmailJobPayload>,
        worker_name: &str,
    ) -> Result<(), QueueError> {
        info!("Processing email job {} with worker {}", job.job_id, worker_name);

        let job_timeout = Duration::from_secs(self.config.job_timeout_seconds);
        let result = timeout(job_timeout, self.handle_email(&job.payload)).await;

        match result {
            Ok(Ok(())) => {
                self.queue
                    .update_status::<EmailJobPayload>(job.job_id, JobStatus::Completed, None)
                    .await?;
                info!("Email job {} completed", job.job_id);
            }
            Ok(Err(e)) => {
                self.fail_and_maybe_retry(&job, e.to_string()).await?;
            }
            Err(_) => {
                let msg = format!(
                    "Job timed out after {} seconds",
                    self.config.job_timeout_seconds
                );
                self.fail_and_maybe_retry(&job, msg).await?;
            }
        }

        Ok(())
    }

    async fn fail_and_maybe_retry(
        &self,
        job: &Job<EmailJobPayload>,
        message: String,
    ) -> Result<(), QueueError> {
        error!("Email job {} failed: {}", job.job_id, message);

        self.queue
            .update_status::<EmailJobPayload>(job.job_id, JobStatus::Failed, Some(message))
            .await?;

        if job.attempt < job.max_attempts {
            let delay = self.retry.delay_for(job.attempt);
            warn!(
                "Email job {} will be retried in {:?} (attempt {}/{})",
                job.job_id, delay, job.attempt, job.max_attempts
            );
            tokio::time::sleep(delay).await;
            self.queue.retry_job::<EmailJobPayload>(job.job_id).await?;
        }

        Ok(())
    }

    async fn handle_email(&self, payload: &EmailJobPayload) -> Result<(), QueueError> {
        let (subject, text, html) = render_confirmation(
            &payload.patient_name,
            &payload.meeting_link,
            payload.slot_start,
            payload.slot_end,
        );

        let invite = ics::booking_invite(
            &payload.appointment_id.to_string(),
            "Dental appointment",
            &format!("Video consultation: {}", payload.meeting_link),
            payload.slot_start,
            payload.slot_end,
            &self.organizer_address,
            &payload.to,
        );

        let message = EmailMessage {
            to: payload.to.clone(),
            subject,
            text,
            html,
            attachment: Some(IcsAttachment {
                filename: "appointment.ics".to_string(),
                content: invite,
            }),
        };

        self.mail.send(&message).await?;
        Ok(())
    }

    async fn wait_for_shutdown(&self) {
        loop {
            if *self.is_shutdown.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn clone_for_worker(&self) -> Self {
        Self {
            config: self.config.clone(),
            retry: self.retry,
            queue: Arc::clone(&self.queue),
            mail: Arc::clone(&self.mail),
            organizer_address: self.organizer_address.clone(),
            is_shutdown: Arc::clone(&self.is_shutdown),
        }
    }
}
