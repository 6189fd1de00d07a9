//! Contact message domain types.
//!
//! Messages live in the realtime database under a generated key. The stored
//! record ([`MessageEntry`]) does not contain the key; [`ContactMessage`] is
//! the entry with its key attached as `id`.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::MessageId;
use super::status::MessageStatus;

/// What the contact form submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
}

impl NewContactMessage {
    /// The record to store for this submission: unread, stamped `now`.
    ///
    /// The timestamp is truncated to the stored millisecond precision.
    #[must_use]
    pub fn into_entry(self, now: DateTime<Utc>) -> MessageEntry {
        MessageEntry {
            name: self.name,
            email: self.email,
            subject: self.subject,
            message: self.message,
            status: MessageStatus::Unread,
            created_at: now.trunc_subsecs(3),
        }
    }
}

/// A contact message as stored at `contact-messages/{id}`.
///
/// `createdAt` is stored as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A stored contact message with its database key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: MessageId,
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
    pub status: MessageStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    /// Attach a database key to a stored entry.
    #[must_use]
    pub fn from_entry(id: MessageId, entry: MessageEntry) -> Self {
        Self {
            id,
            name: entry.name,
            email: entry.email,
            subject: entry.subject,
            message: entry.message,
            status: entry.status,
            created_at: entry.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_into_entry_starts_unread() {
        let now = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        let entry = NewContactMessage {
            name: "Grace".to_string(),
            email: Email::parse("grace@example.com").unwrap(),
            subject: "Allergies".to_string(),
            message: "Do you have nut-free desserts?".to_string(),
        }
        .into_entry(now);

        assert_eq!(entry.status, MessageStatus::Unread);
        assert_eq!(entry.created_at, now);
    }

    #[test]
    fn test_into_entry_truncates_to_millis() {
        let now = Utc.timestamp_nanos(1_760_000_000_123_456_789);
        let entry = NewContactMessage {
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            subject: "Hours".to_string(),
            message: "Open on Sunday?".to_string(),
        }
        .into_entry(now);

        let json = serde_json::to_value(&entry).unwrap();
        let back: MessageEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_entry_wire_format() {
        let json = serde_json::json!({
            "name": "Grace",
            "email": "grace@example.com",
            "subject": "Hi",
            "message": "Hello",
            "status": "read",
            "createdAt": 1_760_000_000_123_i64,
        });

        let entry: MessageEntry = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(entry.status, MessageStatus::Read);
        assert_eq!(entry.created_at.timestamp_millis(), 1_760_000_000_123);
        assert_eq!(serde_json::to_value(&entry).unwrap(), json);

        let message = ContactMessage::from_entry(MessageId::new("-Nabc"), entry);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["id"], "-Nabc");
        assert_eq!(value["createdAt"], 1_760_000_000_123_i64);
    }
}
