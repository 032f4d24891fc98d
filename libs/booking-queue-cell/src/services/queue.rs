use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::QueueError;
use crate::models::{Job, JobStatus};

/// Jobs expire from the hash after a week; failed jobs stay inspectable
/// until then.
const JOB_TTL_SECONDS: i64 = 604_800;

/// Redis-backed job queue. Each job lives in a hash under
/// `{queue}:job:{id}`; job ids move between the `{queue}:pending` and
/// `{queue}:processing` lists with an atomic BRPOPLPUSH.
pub struct RedisJobQueue {
    pool: Pool,
    queue_name: String,
}

impl RedisJobQueue {
    pub async fn new(config: &AppConfig, queue_name: &str) -> Result<Self, QueueError> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Pool(e.to_string()))?;

        let mut conn = pool.get().await.map_err(|e| QueueError::Pool(e.to_string()))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Queue '{}' connected to redis", queue_name);

        Ok(Self {
            pool,
            queue_name: queue_name.to_string(),
        })
    }

    fn job_key(&self, job_id: Uuid) -> String {
        format!("{}:job:{}", self.queue_name, job_id)
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.queue_name)
    }

    fn processing_key(&self) -> String {
        format!("{}:processing", self.queue_name)
    }

    async fn get_connection(&self) -> Result<Connection, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::Pool(e.to_string()))
    }

    pub async fn enqueue<P: Serialize>(&self, job: &Job<P>) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;

        let job_key = self.job_key(job.job_id);
        let job_data = serde_json::to_string(job)?;
        let status = serde_json::to_string(&job.status)?;
        let created_at = job.created_at.to_rfc3339();

        let _: () = conn
            .hset_multiple(
                &job_key,
                &[
                    ("data", job_data.as_str()),
                    ("status", status.as_str()),
                    ("created_at", created_at.as_str()),
                ],
            )
            .await?;
        let _: () = conn.expire(&job_key, JOB_TTL_SECONDS).await?;

        let _: () = conn
            .lpush(self.pending_key(), job.job_id.to_string())
            .await?;

        debug!("Job {} enqueued on '{}'", job.job_id, self.queue_name);
        Ok(())
    }

    /// Atomically claim the next pending job for `worker_id`, blocking for
    /// up to a second.
    pub async fn dequeue<P>(&self, worker_id: &str) -> Result<Option<Job<P>>, QueueError>
    where
        P: Serialize + DeserializeOwned,
    {
        let mut conn = self.get_connection().await?;

        let job_id: Option<String> = conn
            .brpoplpush(self.pending_key(), self.processing_key(), 1.0)
            .await?;

        let Some(job_id_str) = job_id else {
            return Ok(None);
        };

        let job_key = format!("{}:job:{}", self.queue_name, job_id_str);
        let job_data: Option<String> = conn.hget(&job_key, "data").await?;

        let Some(data) = job_data else {
            // Job hash expired while the id sat in the list; drop the id
            let _: () = conn
                .lrem(self.processing_key(), 1, &job_id_str)
                .await?;
            return Ok(None);
        };

        let mut job: Job<P> = serde_json::from_str(&data)?;
        job.status = JobStatus::Processing;
        job.attempt += 1;
        job.worker_id = Some(worker_id.to_string());
        job.updated_at = Utc::now();

        self.write_job(&mut conn, &job).await?;

        debug!(
            "Job {} dequeued by {} (attempt {}/{})",
            job.job_id, worker_id, job.attempt, job.max_attempts
        );
        Ok(Some(job))
    }

    pub async fn update_status<P>(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), QueueError>
    where
        P: Serialize + DeserializeOwned,
    {
        let mut conn = self.get_connection().await?;
        let job_key = self.job_key(job_id);

        let job_data: Option<String> = conn.hget(&job_key, "data").await?;
        let Some(data) = job_data else {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        };

        let mut job: Job<P> = serde_json::from_str(&data)?;

        if !job.status.can_transition_to(status) {
            return Err(QueueError::InvalidStatusTransition {
                from: format!("{:?}", job.status),
                to: format!("{:?}", status),
            });
        }

        job.status = status;
        job.error_message = error_message;
        job.updated_at = Utc::now();

        if status.is_terminal() {
            job.completed_at = Some(Utc::now());
            let _: () = conn
                .lrem(self.processing_key(), 1, job_id.to_string())
                .await?;
        }

        self.write_job(&mut conn, &job).await?;

        debug!("Job {} moved to {:?}", job_id, status);
        Ok(())
    }

    pub async fn get_job<P>(&self, job_id: Uuid) -> Result<Option<Job<P>>, QueueError>
    where
        P: DeserializeOwned,
    {
        let mut conn = self.get_connection().await?;
        let job_data: Option<String> = conn.hget(self.job_key(job_id), "data").await?;

        match job_data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Put a failed job back on the pending list for another attempt.
    pub async fn retry_job<P>(&self, job_id: Uuid) -> Result<(), QueueError>
    where
        P: Serialize + DeserializeOwned,
    {
        let mut conn = self.get_connection().await?;
        let job_key = self.job_key(job_id);

        let job_data: Option<String> = conn.hget(&job_key, "data").await?;
        let Some(data) = job_data else {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        };

        let mut job: Job<P> = serde_json::from_str(&data)?;

        if !job.can_retry() {
            return Err(QueueError::MaxRetriesExceeded {
                job_id: job_id.to_string(),
                max_attempts: job.max_attempts,
            });
        }

        job.status = JobStatus::Retrying;
        job.error_message = None;
        job.worker_id = None;
        job.completed_at = None;
        job.updated_at = Utc::now();

        self.write_job(&mut conn, &job).await?;
        let _: () = conn.lpush(self.pending_key(), job_id.to_string()).await?;

        info!(
            "Job {} requeued (attempt {}/{})",
            job_id, job.attempt, job.max_attempts
        );
        Ok(())
    }

    async fn write_job<P: Serialize>(
        &self,
        conn: &mut Connection,
        job: &Job<P>,
    ) -> Result<(), QueueError> {
        let job_key = self.job_key(job.job_id);
        let job_data = serde_json::to_string(job)?;
        let status = serde_json::to_string(&job.status)?;
        let updated_at = job.updated_at.to_rfc3339();

        let _: () = conn
            .hset_multiple(
                &job_key,
                &[
                    ("data", job_data.as_str()),
                    ("status", status.as_str()),
                    ("updated_at", updated_at.as_str()),
                ],
            )
            .await?;

        Ok(())
    }
}
