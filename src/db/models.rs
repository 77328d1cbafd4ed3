use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The slice of the platform user table the relay consumes. Only display
/// names and roles are needed here; credentials and profile details live in
/// the main platform service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: String,
    pub full_name: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Display-name fallback chain used by notification fan-out.
    pub fn display_name(&self) -> String {
        if !self.full_name.is_empty() {
            self.full_name.clone()
        } else if !self.name.is_empty() {
            self.name.clone()
        } else {
            format!("User {}", self.user_id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserProfile {
    pub user_id: String,
    pub full_name: String,
    pub name: String,
    pub role: String,
}

/// One row per unordered {student, mentor} pair. The pair is stored
/// normalized: `student_id` is always the student side regardless of who
/// sent first. Uniqueness is enforced by a database constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub student_id: String,
    pub mentor_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// A single chat message. Messages are append-only rows keyed by
/// (conversation_id, seq) rather than a serialized log column, so an append
/// is a constant-size insert and the (conversation_id, seq) unique
/// constraint makes concurrent appends detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub conversation_id: i64,
    /// 1-based position within the conversation, strictly increasing.
    pub seq: i64,
    pub sender_type: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversationMessage {
    pub sender_type: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

/// A student's request to connect with a mentor. One per pair; the status
/// moves pending -> accepted|rejected and is then terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub id: i64,
    pub student_id: String,
    pub mentor_id: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConnectionRequest {
    pub student_id: String,
    pub mentor_id: String,
    pub message: Option<String>,
}

/// A mentoring session booking. Meeting metadata is filled in when the
/// mentor schedules an accepted booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub student_id: String,
    pub mentor_id: String,
    pub topic: String,
    pub preferred_date_time: DateTime<Utc>,
    pub message: Option<String>,
    pub status: String,
    pub scheduled_date_time: Option<DateTime<Utc>>,
    pub meeting_link: Option<String>,
    pub meeting_id: Option<String>,
    pub passcode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub student_id: String,
    pub mentor_id: String,
    pub topic: String,
    pub preferred_date_time: DateTime<Utc>,
    pub message: Option<String>,
}

/// Meeting metadata attached when a booking moves accepted -> scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub scheduled_date_time: DateTime<Utc>,
    pub meeting_link: Option<String>,
    pub meeting_id: String,
    pub passcode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::UserProfile;
    use chrono::Utc;

    fn profile(full_name: &str, name: &str) -> UserProfile {
        UserProfile {
            id: 1,
            user_id: "42".to_string(),
            full_name: full_name.to_string(),
            name: name.to_string(),
            role: "student".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(profile("Ada Lovelace", "Ada").display_name(), "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_short_name() {
        assert_eq!(profile("", "Ada").display_name(), "Ada");
    }

    #[test]
    fn display_name_falls_back_to_user_id() {
        assert_eq!(profile("", "").display_name(), "User 42");
    }
}
