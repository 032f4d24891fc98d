use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_queue_cell::models::{WorkerConfig, APPOINTMENT_QUEUE, EMAIL_QUEUE};
use booking_queue_cell::services::queue::RedisJobQueue;
use booking_queue_cell::services::worker::{AppointmentWorker, EmailWorker};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dentora background worker");

    let config = AppConfig::from_env();

    let appointment_queue = Arc::new(
        RedisJobQueue::new(&config, APPOINTMENT_QUEUE)
            .await
            .context("failed to connect appointment queue")?,
    );
    let email_queue = Arc::new(
        RedisJobQueue::new(&config, EMAIL_QUEUE)
            .await
            .context("failed to connect email queue")?,
    );

    let appointment_worker = Arc::new(
        AppointmentWorker::new(
            &config,
            WorkerConfig::appointment(),
            Arc::clone(&appointment_queue),
            Arc::clone(&email_queue),
        )
        .context("failed to start appointment worker")?,
    );
    let email_worker = Arc::new(
        EmailWorker::new(&config, WorkerConfig::email(), Arc::clone(&email_queue))
            .context("failed to start email worker")?,
    );

    let appointment_handle = {
        let worker = Arc::clone(&appointment_worker);
        tokio::spawn(async move { worker.start().await })
    };
    let email_handle = {
        let worker = Arc::clone(&email_worker);
        tokio::spawn(async move { worker.start().await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received, draining workers");

    appointment_worker.shutdown().await;
    email_worker.shutdown().await;

    let _ = appointment_handle.await;
    let _ = email_handle.await;

    info!("Worker stopped");
    Ok(())
}
