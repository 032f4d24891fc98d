use chrono::{Datelike, Duration, NaiveDate, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    DoctorAvailability, DoctorError, DoctorSlot, GenerateSlotsRequest, GenerateSlotsSummary,
    GeneratedSlot, SlotSearchQuery, SlotWithDoctor, ALLOWED_SLOT_DURATIONS,
};

/// Day-of-week index used throughout the schema: 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Partition each availability window applicable to `date` into consecutive
/// half-open `[start, end)` slots of exactly `slot_duration_minutes`. A
/// trailing remainder shorter than the full duration is dropped, not rounded.
///
/// Pure function: persistence is the caller's job. Window invariants are
/// re-checked here rather than assumed.
pub fn generate_slots(
    date: NaiveDate,
    windows: &[DoctorAvailability],
    slot_duration_minutes: i64,
) -> Result<Vec<GeneratedSlot>, DoctorError> {
    if !ALLOWED_SLOT_DURATIONS.contains(&slot_duration_minutes) {
        return Err(DoctorError::Validation(format!(
            "Slot duration must be one of {:?} minutes",
            ALLOWED_SLOT_DURATIONS
        )));
    }

    let day = day_of_week(date);
    let duration = Duration::minutes(slot_duration_minutes);
    let mut slots = Vec::new();

    for window in windows.iter().filter(|w| w.day_of_week == day) {
        if window.start_time >= window.end_time {
            return Err(DoctorError::InvalidWindow(format!(
                "Window {} has start_time >= end_time",
                window.id
            )));
        }

        let window_end = date.and_time(window.end_time).and_utc();
        let mut current = date.and_time(window.start_time).and_utc();

        while current + duration <= window_end {
            slots.push(GeneratedSlot {
                date,
                start_time: current,
                end_time: current + duration,
            });
            current += duration;
        }
    }

    slots.sort_by_key(|slot| slot.start_time);
    Ok(slots)
}

/// Materializes and serves concrete bookable slots. Regeneration is
/// idempotent: rows that already exist for the same doctor + start + end are
/// skipped by the store-level upsert.
pub struct SlotService {
    store: PostgrestClient,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    /// Generate slots for one date from the doctor's availability windows and
    /// persist them. Already-materialized slots are left untouched.
    pub async fn generate_slots_for_date(
        &self,
        doctor_id: Uuid,
        request: GenerateSlotsRequest,
        auth_token: &str,
    ) -> Result<GenerateSlotsSummary, DoctorError> {
        debug!(
            "Generating slots for doctor {} on {} ({} min)",
            doctor_id, request.date, request.slot_duration_minutes
        );

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id,
            day_of_week(request.date)
        );
        let windows: Vec<DoctorAvailability> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let generated = generate_slots(request.date, &windows, request.slot_duration_minutes)?;

        if generated.is_empty() {
            return Ok(GenerateSlotsSummary {
                date: request.date,
                generated: 0,
                inserted: 0,
                skipped_existing: 0,
            });
        }

        let rows: Vec<Value> = generated
            .iter()
            .map(|slot| {
                json!({
                    "doctor_id": doctor_id,
                    "date": slot.date,
                    "start_time": slot.start_time.to_rfc3339(),
                    "end_time": slot.end_time.to_rfc3339(),
                    "is_booked": false
                })
            })
            .collect();

        let inserted: Vec<DoctorSlot> = self
            .store
            .request_with_prefer(
                Method::POST,
                "/rest/v1/doctor_slots?on_conflict=doctor_id,start_time,end_time",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some("resolution=ignore-duplicates,return=representation"),
            )
            .await?;

        debug!(
            "Generated {} slots for doctor {}, {} newly inserted",
            generated.len(),
            doctor_id,
            inserted.len()
        );

        Ok(GenerateSlotsSummary {
            date: request.date,
            generated: generated.len(),
            inserted: inserted.len(),
            skipped_existing: generated.len() - inserted.len(),
        })
    }

    /// Public search over unbooked slots with the doctor summary embedded.
    pub async fn search_slots(
        &self,
        query: SlotSearchQuery,
    ) -> Result<Vec<SlotWithDoctor>, DoctorError> {
        let mut path = String::from(
            "/rest/v1/doctor_slots?is_booked=is.false\
             &select=id,doctor_id,date,start_time,end_time,is_booked,\
             doctor:doctors!inner(id,first_name,last_name,specialization,place)",
        );

        if let Some(date) = query.date {
            path.push_str(&format!("&date=eq.{}", date));
        }
        if let Some(doctor_id) = query.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(ref specialization) = query.specialization {
            path.push_str(&format!(
                "&doctor.specialization=eq.{}",
                urlencoding::encode(specialization)
            ));
        }
        if let Some(ref place) = query.place {
            path.push_str(&format!("&doctor.place=eq.{}", urlencoding::encode(place)));
        }

        path.push_str("&order=start_time.asc");

        let slots: Vec<SlotWithDoctor> = self.store.request(Method::GET, &path, None, None).await?;

        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }

    /// Delete a slot. Only unbooked slots may be deleted; booked slots are
    /// referenced by an appointment and must survive.
    pub async fn delete_slot(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let path = format!(
            "/rest/v1/doctor_slots?id=eq.{}&doctor_id=eq.{}",
            slot_id, doctor_id
        );
        let existing: Vec<DoctorSlot> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let slot = existing.into_iter().next().ok_or(DoctorError::SlotNotFound)?;
        if slot.is_booked {
            return Err(DoctorError::SlotBooked);
        }

        let delete_path = format!(
            "/rest/v1/doctor_slots?id=eq.{}&doctor_id=eq.{}&is_booked=is.false",
            slot_id, doctor_id
        );
        let _: Vec<Value> = self
            .store
            .request_with_prefer(
                Method::DELETE,
                &delete_path,
                Some(auth_token),
                None,
                Some("return=representation"),
            )
            .await?;

        Ok(())
    }
}
