use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{PostgrestClient, StoreError};

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentPage, AppointmentStatus,
    BookAppointmentRequest, BookedAppointment, PageMeta, PatientUser, SlotRecord, StatusCounts,
    UpdateAppointmentsRequest,
};
use crate::services::lifecycle::validate_transition;

/// Transient store failures during the claim sequence are retried this many
/// times before the booking is reported as lost.
const MAX_BOOKING_ATTEMPTS: u32 = 3;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct StatusRow {
    status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct DoctorIdRow {
    id: Uuid,
}

/// Books slots and manages a doctor's appointment dashboard. The booking
/// sequence claims the slot with a filtered single-row update so two
/// concurrent requests for the same slot can never both succeed.
pub struct BookingService {
    store: PostgrestClient,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    /// Book a slot for a patient, creating the patient account on first
    /// contact. Public flow: the store is accessed with the service role of
    /// the anon key.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<BookedAppointment, AppointmentError> {
        request.validate()?;

        let patient = self.resolve_or_create_patient(&request).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_book(&request, &patient).await {
                Ok(booked) => {
                    info!(
                        "Appointment {} booked for slot {}",
                        booked.appointment.id, request.slot_id
                    );
                    return Ok(booked);
                }
                Err(AppointmentError::Store(err))
                    if err.is_retryable() && attempt < MAX_BOOKING_ATTEMPTS =>
                {
                    warn!(
                        "Transient failure booking slot {} (attempt {}): {}",
                        request.slot_id, attempt, err
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Look the patient up by email, creating the account when it does not
    /// exist yet. A concurrent creation of the same email surfaces as a
    /// store conflict and resolves by re-fetching.
    async fn resolve_or_create_patient(
        &self,
        request: &BookAppointmentRequest,
    ) -> Result<PatientUser, AppointmentError> {
        let path = format!(
            "/rest/v1/users?email=eq.{}",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<PatientUser> = self.store.request(Method::GET, &path, None, None).await?;

        if let Some(patient) = existing.into_iter().next() {
            return Ok(patient);
        }

        debug!("Creating patient account for {}", request.email);

        let user_data = json!({
            "name": format!("{} {}", request.first_name, request.last_name),
            "email": request.email,
            "phone_no": request.phone_no,
            "created_at": Utc::now().to_rfc3339()
        });

        let created: Result<Vec<PatientUser>, StoreError> = self
            .store
            .request_with_prefer(
                Method::POST,
                "/rest/v1/users",
                None,
                Some(user_data),
                Some("return=representation"),
            )
            .await;

        match created {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| AppointmentError::Validation("Failed to create patient".to_string())),
            // Lost a creation race on the unique email: the account exists now
            Err(StoreError::Conflict(_)) => {
                let rows: Vec<PatientUser> =
                    self.store.request(Method::GET, &path, None, None).await?;
                rows.into_iter().next().ok_or_else(|| {
                    AppointmentError::Validation("Failed to resolve patient".to_string())
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One booking attempt: check the slot, claim it with a compare-and-set,
    /// then create the appointment. The claim is released if the appointment
    /// insert fails.
    async fn try_book(
        &self,
        request: &BookAppointmentRequest,
        patient: &PatientUser,
    ) -> Result<BookedAppointment, AppointmentError> {
        let slot_path = format!("/rest/v1/doctor_slots?id=eq.{}", request.slot_id);
        let slots: Vec<SlotRecord> = self.store.request(Method::GET, &slot_path, None, None).await?;
        let slot = slots
            .into_iter()
            .next()
            .ok_or(AppointmentError::SlotNotFound)?;

        if slot.is_booked {
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        if slot.doctor_id != request.doctor_id {
            return Err(AppointmentError::Validation(
                "Slot does not belong to the requested doctor".to_string(),
            ));
        }

        let existing_path = format!(
            "/rest/v1/appointments?slot_id=eq.{}&select=id",
            request.slot_id
        );
        let existing: Vec<IdRow> = self
            .store
            .request(Method::GET, &existing_path, None, None)
            .await?;
        if !existing.is_empty() {
            return Err(AppointmentError::DuplicateBooking);
        }

        // Compare-and-set claim: the filter only matches while the slot is
        // still free, so exactly one concurrent booking gets a row back
        let claim_path = format!(
            "/rest/v1/doctor_slots?id=eq.{}&is_booked=is.false",
            request.slot_id
        );
        let claimed: Vec<SlotRecord> = self
            .store
            .request_with_prefer(
                Method::PATCH,
                &claim_path,
                None,
                Some(json!({ "is_booked": true })),
                Some("return=representation"),
            )
            .await?;

        let claimed_slot = claimed
            .into_iter()
            .next()
            .ok_or(AppointmentError::SlotAlreadyBooked)?;

        // doctor_id is denormalized from the claimed slot, never the request
        let appointment_data = json!({
            "first_name": request.first_name,
            "last_name": request.last_name,
            "age": request.age,
            "gender": request.gender,
            "phone_no": request.phone_no,
            "email": request.email,
            "doctor_id": claimed_slot.doctor_id,
            "slot_id": request.slot_id,
            "appointment_date": claimed_slot.start_time.to_rfc3339(),
            "status": AppointmentStatus::Pending,
            "user_id": patient.id,
            "created_at": Utc::now().to_rfc3339()
        });

        let inserted: Result<Vec<Appointment>, StoreError> = self
            .store
            .request_with_prefer(
                Method::POST,
                "/rest/v1/appointments",
                None,
                Some(appointment_data),
                Some("return=representation"),
            )
            .await;

        match inserted {
            Ok(rows) => {
                let appointment = rows.into_iter().next().ok_or_else(|| {
                    AppointmentError::Validation("Failed to create appointment".to_string())
                })?;
                Ok(BookedAppointment {
                    appointment,
                    slot: claimed_slot,
                })
            }
            Err(err) => {
                self.release_claim(request.slot_id).await;
                // Unique slot_id constraint: another appointment won the slot
                match err {
                    StoreError::Conflict(_) => Err(AppointmentError::SlotAlreadyBooked),
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Best-effort rollback of a slot claim after a failed appointment
    /// insert. A failure here leaves the slot booked with no appointment;
    /// logged loudly so operators can reconcile.
    async fn release_claim(&self, slot_id: Uuid) {
        let path = format!("/rest/v1/doctor_slots?id=eq.{}", slot_id);
        let released: Result<Vec<Value>, StoreError> = self
            .store
            .request_with_prefer(
                Method::PATCH,
                &path,
                None,
                Some(json!({ "is_booked": false })),
                Some("return=representation"),
            )
            .await;

        if let Err(err) = released {
            warn!("Failed to release claim on slot {}: {}", slot_id, err);
        }
    }

    /// Resolve the doctor row owned by an authenticated user.
    pub async fn doctor_id_for_user(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Uuid, AppointmentError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}&select=id", user_id);
        let rows: Vec<DoctorIdRow> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or(AppointmentError::NotFound)
    }

    /// One dashboard page of a doctor's appointments, newest first, with
    /// per-status counts over the doctor's full history.
    pub async fn list_appointments(
        &self,
        doctor_id: Uuid,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<AppointmentPage, AppointmentError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let counts_path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&select=status",
            doctor_id
        );
        let status_rows: Vec<StatusRow> = self
            .store
            .request(Method::GET, &counts_path, Some(auth_token), None)
            .await?;

        let mut counts = StatusCounts::default();
        for row in &status_rows {
            match row.status {
                AppointmentStatus::Pending => counts.pending += 1,
                AppointmentStatus::Confirmed => counts.confirmed += 1,
                AppointmentStatus::Cancelled => counts.cancelled += 1,
                AppointmentStatus::Completed => counts.completed += 1,
            }
        }

        let total = match query.status {
            Some(AppointmentStatus::Pending) => counts.pending,
            Some(AppointmentStatus::Confirmed) => counts.confirmed,
            Some(AppointmentStatus::Cancelled) => counts.cancelled,
            Some(AppointmentStatus::Completed) => counts.completed,
            None => status_rows.len(),
        };

        let mut path = format!("/rest/v1/appointments?doctor_id=eq.{}", doctor_id);
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str(&format!(
            "&order=appointment_date.desc&limit={}&offset={}",
            limit,
            (page - 1) * limit
        ));

        let appointments: Vec<Appointment> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(AppointmentPage {
            appointments,
            meta: PageMeta {
                page,
                limit,
                total,
                counts,
            },
        })
    }

    /// Batch status update over a doctor's own appointments. All-or-nothing:
    /// every id must belong to the doctor and every transition must be
    /// legal, otherwise nothing is written.
    pub async fn update_appointments(
        &self,
        doctor_id: Uuid,
        request: UpdateAppointmentsRequest,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if request.appointment_ids.is_empty() {
            return Err(AppointmentError::Validation(
                "No appointment ids provided".to_string(),
            ));
        }

        let id_list = request
            .appointment_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let fetch_path = format!(
            "/rest/v1/appointments?id=in.({})&doctor_id=eq.{}",
            id_list, doctor_id
        );
        let current: Vec<Appointment> = self
            .store
            .request(Method::GET, &fetch_path, Some(auth_token), None)
            .await?;

        if current.len() != request.appointment_ids.len() {
            return Err(AppointmentError::NotFound);
        }

        for appointment in &current {
            validate_transition(appointment.status, request.status)?;
        }

        let update_data = json!({
            "status": request.status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated: Vec<Appointment> = self
            .store
            .request_with_prefer(
                Method::PATCH,
                &fetch_path,
                Some(auth_token),
                Some(update_data),
                Some("return=representation"),
            )
            .await?;

        info!(
            "Updated {} appointments to {} for doctor {}",
            updated.len(),
            request.status,
            doctor_id
        );

        Ok(updated)
    }
}
