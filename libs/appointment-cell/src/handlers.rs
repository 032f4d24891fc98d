use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use booking_queue_cell::models::AppointmentJobPayload;
use booking_queue_cell::services::producer::NotificationProducer;

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, BookedAppointment, UpdateAppointmentsRequest,
};
use crate::services::BookingService;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

/// Patient booking entry point. The appointment is created transactionally;
/// queuing the confirmation notification is best-effort and never fails the
/// booking.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking_service = BookingService::new(&state);
    let booked = booking_service.book_appointment(request).await?;

    let notification_queued = queue_notification(&state, &booked).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "appointment_id": booked.appointment.id,
            "status": booked.appointment.status,
            "appointment_date": booked.appointment.appointment_date,
            "notification_queued": notification_queued
        })),
    ))
}

async fn queue_notification(state: &AppConfig, booked: &BookedAppointment) -> bool {
    let payload = AppointmentJobPayload {
        appointment_id: booked.appointment.id,
        email: booked.appointment.email.clone(),
        patient_name: format!(
            "{} {}",
            booked.appointment.first_name, booked.appointment.last_name
        ),
        slot_start: booked.slot.start_time,
        slot_end: booked.slot.end_time,
    };

    match NotificationProducer::new(state).await {
        Ok(producer) => match producer.enqueue_booking_notification(payload).await {
            Ok(job_id) => {
                info!(
                    "Notification job {} queued for appointment {}",
                    job_id, booked.appointment.id
                );
                true
            }
            Err(err) => {
                warn!(
                    "Failed to queue notification for appointment {}: {}",
                    booked.appointment.id, err
                );
                false
            }
        },
        Err(err) => {
            warn!(
                "Notification queue unavailable, appointment {} booked without notification: {}",
                booked.appointment.id, err
            );
            false
        }
    }
}

// ==============================================================================
// PROTECTED DASHBOARD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let doctor_id = booking_service.doctor_id_for_user(&user.id, token).await?;

    let page = booking_service
        .list_appointments(doctor_id, query, token)
        .await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn update_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentsRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let doctor_id = booking_service.doctor_id_for_user(&user.id, token).await?;

    let updated = booking_service
        .update_appointments(doctor_id, request, token)
        .await?;

    Ok(Json(json!({
        "updated": updated,
        "total": updated.len()
    })))
}
