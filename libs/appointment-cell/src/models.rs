use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

/// Appointment lifecycle. Stored in SCREAMING_SNAKE_CASE; CANCELLED and
/// COMPLETED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub gender: String,
    pub phone_no: String,
    pub email: String,
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub meet_link: Option<String>,
    pub user_id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Patient account row, resolved or lazily created by email at booking time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_no: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Slot row as the booking flow reads it from the store. Kept local so the
/// cell talks to the table without a cross-cell dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub gender: String,
    pub phone_no: String,
    pub email: String,
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
}

impl BookAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "Patient name is required".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(AppointmentError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if self.age <= 0 || self.age > 130 {
            return Err(AppointmentError::Validation(
                "Age must be between 1 and 130".to_string(),
            ));
        }
        if self.phone_no.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "Phone number is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Successful booking: the created appointment plus the slot it claimed.
#[derive(Debug, Clone, Serialize)]
pub struct BookedAppointment {
    pub appointment: Appointment,
    pub slot: SlotRecord,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub counts: StatusCounts,
}

/// One dashboard page of a doctor's appointments, newest first.
#[derive(Debug, Serialize)]
pub struct AppointmentPage {
    pub appointments: Vec<Appointment>,
    pub meta: PageMeta,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentsRequest {
    pub appointment_ids: Vec<Uuid>,
    pub status: AppointmentStatus,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Slot not found")]
    SlotNotFound,

    #[error("Slot is already booked")]
    SlotAlreadyBooked,

    #[error("An appointment already exists for this slot")]
    DuplicateBooking,

    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::SlotAlreadyBooked | AppointmentError::DuplicateBooking => {
                AppError::Conflict(message)
            }
            AppointmentError::SlotNotFound | AppointmentError::NotFound => {
                AppError::NotFound(message)
            }
            AppointmentError::Validation(_) | AppointmentError::InvalidTransition { .. } => {
                AppError::ValidationError(message)
            }
            AppointmentError::Store(StoreError::Transient(_)) => {
                AppError::ExternalService(message)
            }
            AppointmentError::Store(_) => AppError::Database(message),
        }
    }
}
