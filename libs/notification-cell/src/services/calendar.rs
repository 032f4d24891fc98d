use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::{CalendarEventResponse, MeetingDetails, NotificationError};

/// Google-Calendar-style client that creates events with an attached video
/// conference. Used by the post-booking worker; the API only cares about the
/// REST surface, not the provider.
#[derive(Debug)]
pub struct CalendarClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl CalendarClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_calendar_configured() {
            return Err(NotificationError::NotConfigured(
                "calendar credentials missing".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.calendar_base_url.clone(),
            api_token: config.calendar_api_token.clone(),
        })
    }

    /// Create a calendar event with a conference attached and return its
    /// meet link. `request_id` keys conference provisioning so a retried
    /// call reuses the same conference instead of creating another.
    pub async fn create_meeting(
        &self,
        summary: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        attendee_email: &str,
        request_id: &str,
    ) -> Result<MeetingDetails, NotificationError> {
        debug!("Creating calendar event: {}", summary);

        let event = json!({
            "summary": summary,
            "description": description,
            "start": { "dateTime": start.to_rfc3339(), "timeZone": "UTC" },
            "end": { "dateTime": end.to_rfc3339(), "timeZone": "UTC" },
            "attendees": [{ "email": attendee_email }],
            "conferenceData": {
                "createRequest": {
                    "requestId": request_id,
                    "conferenceSolutionKey": { "type": "hangoutsMeet" }
                }
            }
        });

        let url = format!(
            "{}/calendars/primary/events?conferenceDataVersion=1",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::MeetingCreation(format!(
                "calendar API returned {}: {}",
                status, body
            )));
        }

        let created: CalendarEventResponse = response.json().await?;
        let meet_link = created.meet_link().ok_or_else(|| {
            NotificationError::MeetingCreation("event created without a meet link".to_string())
        })?;

        info!("Calendar event {} created with meet link", created.id);

        Ok(MeetingDetails {
            event_id: created.id,
            meet_link,
        })
    }
}
