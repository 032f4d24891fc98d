use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::{EmailMessage, NotificationError};

/// Transactional mail over the provider's REST API.
#[derive(Debug)]
pub struct MailClient {
    client: Client,
    base_url: String,
    api_token: String,
    from_address: String,
}

impl MailClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_mail_configured() {
            return Err(NotificationError::NotConfigured(
                "mail credentials missing".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.mail_api_base_url.clone(),
            api_token: config.mail_api_token.clone(),
            from_address: config.mail_from_address.clone(),
        })
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        debug!("Sending mail to {}: {}", message.to, message.subject);

        let mut body = json!({
            "from": self.from_address,
            "to": message.to,
            "subject": message.subject,
            "text": message.text,
            "html": message.html,
        });

        if let Some(attachment) = &message.attachment {
            body["attachments"] = json!([{
                "filename": attachment.filename,
                "content": attachment.content,
                "content_type": "text/calendar; method=REQUEST"
            }]);
        }

        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NotificationError::MailDelivery(format!(
                "mail API returned {}: {}",
                status, text
            )));
        }

        info!("Confirmation mail sent to {}", message.to);
        Ok(())
    }
}

/// Booking confirmation copy, shared by the text and HTML parts.
pub fn render_confirmation(
    patient_name: &str,
    meeting_link: &str,
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
) -> (String, String, String) {
    let subject = format!(
        "Your appointment on {} is booked",
        slot_start.format("%B %e, %Y")
    );

    let window = format!(
        "{} to {} UTC",
        slot_start.format("%H:%M"),
        slot_end.format("%H:%M")
    );

    let text = format!(
        "Hi {},\n\n\
         Your appointment is booked for {} from {}.\n\
         Join the video consultation here: {}\n\n\
         The attached invite adds the appointment to your calendar.\n\n\
         Dentora",
        patient_name,
        slot_start.format("%A, %B %e, %Y"),
        window,
        meeting_link
    );

    let html = format!(
        "<p>Hi {},</p>\
         <p>Your appointment is booked for <strong>{}</strong> from <strong>{}</strong>.</p>\
         <p><a href=\"{}\">Join the video consultation</a></p>\
         <p>The attached invite adds the appointment to your calendar.</p>\
         <p>Dentora</p>",
        patient_name,
        slot_start.format("%A, %B %e, %Y"),
        window,
        meeting_link
    );

    (subject, text, html)
}
