use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{CreateAvailabilityRequest, DoctorAvailability, DoctorError};

/// Manages a doctor's recurring weekly availability windows. Windows are
/// immutable; deleting one never touches slots that were already
/// materialized from it (slot materialization is a snapshot).
pub struct AvailabilityService {
    store: PostgrestClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    /// Create an availability window for a doctor. Fails when the window
    /// overlaps an existing window on the same day.
    pub async fn create_availability(
        &self,
        doctor_id: Uuid,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<DoctorAvailability, DoctorError> {
        debug!("Creating availability for doctor: {}", doctor_id);

        if request.start_time >= request.end_time {
            return Err(DoctorError::InvalidWindow(
                "Start time must be before end time".to_string(),
            ));
        }

        if request.day_of_week < 0 || request.day_of_week > 6 {
            return Err(DoctorError::Validation(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }

        self.check_overlap(doctor_id, &request, auth_token).await?;

        let availability_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<DoctorAvailability> = self
            .store
            .request_with_prefer(
                Method::POST,
                "/rest/v1/doctor_availability",
                Some(auth_token),
                Some(availability_data),
                Some("return=representation"),
            )
            .await?;

        let availability = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::Validation("Failed to create availability".to_string()))?;

        debug!("Availability created with ID: {}", availability.id);
        Ok(availability)
    }

    /// List a doctor's availability windows ordered by day and start time.
    pub async fn list_availability(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<DoctorAvailability>, DoctorError> {
        debug!("Fetching availability for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let availabilities: Vec<DoctorAvailability> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(availabilities)
    }

    /// Delete an availability window. Doctor-scoped: a doctor can only delete
    /// their own windows, anything else reports not-found.
    pub async fn delete_availability(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        debug!(
            "Deleting availability {} for doctor {}",
            availability_id, doctor_id
        );

        let path = format!(
            "/rest/v1/doctor_availability?id=eq.{}&doctor_id=eq.{}",
            availability_id, doctor_id
        );
        let deleted: Vec<Value> = self
            .store
            .request_with_prefer(
                Method::DELETE,
                &path,
                Some(auth_token),
                None,
                Some("return=representation"),
            )
            .await?;

        if deleted.is_empty() {
            return Err(DoctorError::AvailabilityNotFound);
        }

        Ok(())
    }

    /// Strict half-open interval overlap test against every existing window
    /// for the same doctor and day: new.start < existing.end &&
    /// existing.start < new.end.
    async fn check_overlap(
        &self,
        doctor_id: Uuid,
        request: &CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}",
            doctor_id, request.day_of_week
        );

        let existing: Vec<DoctorAvailability> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        for window in existing {
            if request.start_time < window.end_time && window.start_time < request.end_time {
                return Err(DoctorError::Overlap);
            }
        }

        Ok(())
    }
}
