use chrono::{DateTime, Utc};

/// `YYYYMMDDTHHMMSSZ` timestamp as iCalendar wants it.
fn format_ics_date(moment: DateTime<Utc>) -> String {
    moment.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape text per RFC 5545: backslash, semicolon, comma and newlines.
fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Render a single-event calendar invite for a booked appointment. The uid
/// is derived from the appointment so re-sent invites update rather than
/// duplicate the event in the recipient's calendar.
pub fn booking_invite(
    uid: &str,
    summary: &str,
    description: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    organizer_email: &str,
    attendee_email: &str,
) -> String {
    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Dentora//Appointment Booking//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:REQUEST".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@dentora", uid),
        format!("DTSTAMP:{}", format_ics_date(Utc::now())),
        format!("DTSTART:{}", format_ics_date(start)),
        format!("DTEND:{}", format_ics_date(end)),
        format!("SUMMARY:{}", escape_text(summary)),
        format!("DESCRIPTION:{}", escape_text(description)),
        format!("ORGANIZER;CN=Dentora:mailto:{}", organizer_email),
        format!(
            "ATTENDEE;ROLE=REQ-PARTICIPANT;PARTSTAT=NEEDS-ACTION:mailto:{}",
            attendee_email
        ),
        "STATUS:CONFIRMED".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    lines.join("\r\n")
}
