use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{Doctor, DoctorError, UpdateDoctorRequest};

/// Doctor profile lookups and edits, scoped to the authenticated user's
/// identity. Profiles are never hard-deleted.
pub struct DoctorService {
    store: PostgrestClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    pub async fn get_profile(&self, user_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile for user: {}", user_id);

        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let result: Vec<Doctor> = self
            .store
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result.into_iter().next().ok_or(DoctorError::DoctorNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile for user: {}", user_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(specialization) = request.specialization {
            update_data.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(experience_years) = request.experience_years {
            update_data.insert("experience_years".to_string(), json!(experience_years));
        }
        if let Some(place) = request.place {
            update_data.insert("place".to_string(), json!(place));
        }
        if let Some(phone_no) = request.phone_no {
            update_data.insert("phone_no".to_string(), json!(phone_no));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }

        if update_data.is_empty() {
            return Err(DoctorError::Validation(
                "No fields provided to update".to_string(),
            ));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let result: Vec<Doctor> = self
            .store
            .request_with_prefer(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(serde_json::Value::Object(update_data)),
                Some("return=representation"),
            )
            .await?;

        result.into_iter().next().ok_or(DoctorError::DoctorNotFound)
    }
}
