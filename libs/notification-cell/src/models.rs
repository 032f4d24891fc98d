use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Video meeting created for a confirmed booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub event_id: String,
    pub meet_link: String,
}

/// Calendar event as the provider returns it. The meet link lives either on
/// `hangoutLink` or inside the conference entry points, depending on how the
/// conference was provisioned.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventResponse {
    pub id: String,
    pub hangout_link: Option<String>,
    pub conference_data: Option<ConferenceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(default)]
    pub entry_points: Vec<ConferenceEntryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceEntryPoint {
    pub entry_point_type: Option<String>,
    pub uri: Option<String>,
}

impl CalendarEventResponse {
    /// Prefer the direct hangout link, fall back to the first video entry
    /// point.
    pub fn meet_link(&self) -> Option<String> {
        if let Some(link) = &self.hangout_link {
            return Some(link.clone());
        }
        self.conference_data.as_ref().and_then(|data| {
            data.entry_points
                .iter()
                .find(|entry| entry.entry_point_type.as_deref() == Some("video"))
                .and_then(|entry| entry.uri.clone())
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IcsAttachment {
    pub filename: String,
    pub content: String,
}

/// Outbound email, ready for the mail provider.
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<IcsAttachment>,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification channel is not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to create meeting: {0}")]
    MeetingCreation(String),

    #[error("Failed to deliver mail: {0}")]
    MailDelivery(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
