use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

/// Slot durations the clinic offers. Policy choice, not a technical limit.
pub const ALLOWED_SLOT_DURATIONS: [i64; 4] = [15, 30, 45, 60];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub experience_years: i32,
    pub place: String,
    pub phone_no: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Doctor fields embedded in public slot listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub place: String,
}

/// Recurring weekly availability window. Immutable once created; edits are
/// delete + recreate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: Option<DateTime<Utc>>,
}

/// Materialized bookable slot. `is_booked` goes false -> true exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotWithDoctor {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
    pub doctor: DoctorSummary,
}

/// Output of the pure slot generator, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedSlot {
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct GenerateSlotsRequest {
    pub date: NaiveDate,
    pub slot_duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct GenerateSlotsSummary {
    pub date: NaiveDate,
    pub generated: usize,
    pub inserted: usize,
    pub skipped_existing: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlotSearchQuery {
    pub date: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub specialization: Option<String>,
    pub place: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub place: Option<String>,
    pub phone_no: Option<String>,
    pub email: Option<String>,
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Availability window is invalid: {0}")]
    InvalidWindow(String),

    #[error("Availability overlaps an existing window for that day")]
    Overlap,

    #[error("Doctor profile not found")]
    DoctorNotFound,

    #[error("Availability not found")]
    AvailabilityNotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Slot is already booked")]
    SlotBooked,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        let message = err.to_string();
        match err {
            DoctorError::InvalidWindow(_) | DoctorError::Validation(_) => {
                AppError::ValidationError(message)
            }
            DoctorError::Overlap | DoctorError::SlotBooked => AppError::Conflict(message),
            DoctorError::DoctorNotFound
            | DoctorError::AvailabilityNotFound
            | DoctorError::SlotNotFound => AppError::NotFound(message),
            DoctorError::Store(StoreError::Transient(_)) => AppError::ExternalService(message),
            DoctorError::Store(_) => AppError::Database(message),
        }
    }
}
