//! JSON frame types exchanged over relay connections, and topic naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::{ConnectionRequest, ConversationMessage};

/// Topic every notification frame is fanned out to.
pub const GLOBAL_NOTIFICATIONS_TOPIC: &str = "global_notifications";

/// Canonical per-pair chat topic. The two ids are sorted so both sides end
/// up on the same topic regardless of who connected first.
pub fn chat_topic(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("chat_{lo}_{hi}")
}

pub fn mentor_topic(mentor_id: &str) -> String {
    format!("mentor_{mentor_id}")
}

pub fn status_topic(request_id: i64) -> String {
    format!("status_{request_id}")
}

/// Clients historically send ids both as JSON numbers and as strings;
/// normalize them to strings on the way in.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Number(i64),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(s) => s,
        IdRepr::Number(n) => n.to_string(),
    })
}

/// Inbound chat frame: `{content, sender_type, sender_id, receiver_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundChat {
    pub content: String,
    pub sender_type: String,
    #[serde(deserialize_with = "lenient_id")]
    pub sender_id: String,
    #[serde(deserialize_with = "lenient_id")]
    pub receiver_id: String,
}

/// Chat message as it appears on the wire; `id` is the conversation-local
/// sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: i64,
    pub sender_type: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

impl From<&ConversationMessage> for WireMessage {
    fn from(message: &ConversationMessage) -> Self {
        Self {
            id: message.seq,
            sender_type: message.sender_type.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            timestamp: message.created_at,
            status: message.status.clone(),
        }
    }
}

/// Frames published to topics or sent directly to a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Message {
        message: WireMessage,
        sender_id: String,
        receiver_id: String,
    },
    MessageNotification {
        sender_id: String,
        sender_name: String,
        sender_type: String,
        content: String,
        timestamp: DateTime<Utc>,
        receiver_id: String,
    },
    NewRequest {
        request: ConnectionRequest,
    },
    StatusUpdate {
        request: ConnectionRequest,
    },
    Error {
        error: String,
    },
}

impl OutboundFrame {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundFrame::Error {
            error: message.into(),
        }
    }

    /// The recipient this frame is addressed to, when it carries one.
    /// Scoped subscriptions filter on this.
    pub fn receiver_id(&self) -> Option<&str> {
        match self {
            OutboundFrame::Message { receiver_id, .. }
            | OutboundFrame::MessageNotification { receiver_id, .. } => Some(receiver_id),
            OutboundFrame::NewRequest { .. }
            | OutboundFrame::StatusUpdate { .. }
            | OutboundFrame::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InboundChat, OutboundFrame, WireMessage, chat_topic};
    use chrono::Utc;

    #[test]
    fn chat_topic_is_order_independent() {
        assert_eq!(chat_topic("10", "20"), "chat_10_20");
        assert_eq!(chat_topic("20", "10"), "chat_10_20");
        assert_eq!(chat_topic("7", "7"), "chat_7_7");
    }

    #[test]
    fn inbound_frame_accepts_numeric_and_string_ids() {
        let from_numbers: InboundChat =
            serde_json::from_str(r#"{"content":"Hi","sender_type":"student","sender_id":10,"receiver_id":20}"#)
                .expect("numeric ids parse");
        assert_eq!(from_numbers.sender_id, "10");
        assert_eq!(from_numbers.receiver_id, "20");

        let from_strings: InboundChat =
            serde_json::from_str(r#"{"content":"Hi","sender_type":"student","sender_id":"10","receiver_id":"20"}"#)
                .expect("string ids parse");
        assert_eq!(from_strings.sender_id, "10");
    }

    #[test]
    fn inbound_frame_requires_all_fields() {
        let missing: Result<InboundChat, _> =
            serde_json::from_str(r#"{"content":"Hi","sender_type":"student","sender_id":10}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn message_frame_serializes_with_type_tag() {
        let frame = OutboundFrame::Message {
            message: WireMessage {
                id: 1,
                sender_type: "student".to_string(),
                sender_id: "10".to_string(),
                receiver_id: "20".to_string(),
                content: "Hi".to_string(),
                timestamp: Utc::now(),
                status: "sent".to_string(),
            },
            sender_id: "10".to_string(),
            receiver_id: "20".to_string(),
        };

        let value = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(value["type"], "message");
        assert_eq!(value["message"]["id"], 1);
        assert_eq!(value["message"]["status"], "sent");
    }

    #[test]
    fn notification_frame_exposes_receiver_for_filtering() {
        let frame = OutboundFrame::MessageNotification {
            sender_id: "10".to_string(),
            sender_name: "Ada".to_string(),
            sender_type: "student".to_string(),
            content: "You have a new message from Ada".to_string(),
            timestamp: Utc::now(),
            receiver_id: "20".to_string(),
        };

        assert_eq!(frame.receiver_id(), Some("20"));
        let value = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(value["type"], "message_notification");
    }
}
