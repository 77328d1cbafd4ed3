//! Conversation relay: canonical-pair resolution, durable ordered append
//! and topic broadcast.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{ConversationMessage, DatabaseManager, NewConversationMessage};
use crate::lifecycle::{RequestStatus, SenderRole};

pub mod frames;
pub mod topics;

pub use frames::{
    GLOBAL_NOTIFICATIONS_TOPIC, InboundChat, OutboundFrame, WireMessage, chat_topic, mentor_topic,
    status_topic,
};
pub use topics::{SubscriptionId, TopicRegistry};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

/// Resolves which side of a message is the student and which the mentor.
/// The conversation row is always keyed (student, mentor) no matter who
/// wrote first, so both directions land on the same record.
pub fn normalize_pair<'a>(
    role: SenderRole,
    sender_id: &'a str,
    receiver_id: &'a str,
) -> (&'a str, &'a str) {
    match role {
        SenderRole::Student => (sender_id, receiver_id),
        _ => (receiver_id, sender_id),
    }
}

pub struct ChatRelay {
    db: Arc<DatabaseManager>,
    topics: Arc<TopicRegistry>,
    max_content_length: usize,
}

impl ChatRelay {
    pub fn new(db: Arc<DatabaseManager>, topics: Arc<TopicRegistry>, max_content_length: usize) -> Self {
        Self {
            db,
            topics,
            max_content_length,
        }
    }

    pub fn topics(&self) -> Arc<TopicRegistry> {
        self.topics.clone()
    }

    /// Persists one chat message and broadcasts it.
    ///
    /// The append happens before any broadcast: a message that was never
    /// saved must never reach a live connection. Broadcast delivery is
    /// best-effort; nobody listening is not an error.
    pub async fn send_message(
        &self,
        inbound: InboundChat,
    ) -> Result<ConversationMessage, RelayError> {
        let role: SenderRole = inbound
            .sender_type
            .parse()
            .map_err(RelayError::Validation)?;
        if inbound.sender_id.is_empty() || inbound.receiver_id.is_empty() {
            return Err(RelayError::Validation(
                "sender_id and receiver_id are required".to_string(),
            ));
        }
        if inbound.content.is_empty() {
            return Err(RelayError::Validation("content is required".to_string()));
        }
        if inbound.content.len() > self.max_content_length {
            return Err(RelayError::Validation(format!(
                "content exceeds {} bytes",
                self.max_content_length
            )));
        }

        let (student_id, mentor_id) = normalize_pair(role, &inbound.sender_id, &inbound.receiver_id);

        let store = self.db.conversation_store();
        let conversation = match store.get_by_pair(student_id, mentor_id).await? {
            Some(existing) => existing,
            None => store.create(student_id, mentor_id).await?,
        };

        let message = store
            .append_message(
                conversation.id,
                &NewConversationMessage {
                    sender_type: role.as_str().to_string(),
                    sender_id: inbound.sender_id.clone(),
                    receiver_id: inbound.receiver_id.clone(),
                    content: inbound.content.clone(),
                },
            )
            .await?;

        let topic = chat_topic(&inbound.sender_id, &inbound.receiver_id);
        let delivered = self.topics.publish(
            &topic,
            &OutboundFrame::Message {
                message: WireMessage::from(&message),
                sender_id: message.sender_id.clone(),
                receiver_id: message.receiver_id.clone(),
            },
        );
        debug!(%topic, seq = message.seq, delivered, "message broadcast");

        let sender_name = self.display_name(&message.sender_id).await;
        self.topics.publish(
            GLOBAL_NOTIFICATIONS_TOPIC,
            &OutboundFrame::MessageNotification {
                sender_id: message.sender_id.clone(),
                sender_name: sender_name.clone(),
                sender_type: message.sender_type.clone(),
                content: format!("You have a new message from {sender_name}"),
                timestamp: message.created_at,
                receiver_id: message.receiver_id.clone(),
            },
        );

        Ok(message)
    }

    /// Best-effort display-name lookup; unknown users get a placeholder
    /// rather than failing the send.
    pub async fn display_name(&self, user_id: &str) -> String {
        match self.db.user_store().get_by_user_id(user_id).await {
            Ok(Some(profile)) => profile.display_name(),
            Ok(None) => format!("User {user_id}"),
            Err(e) => {
                warn!(user_id, error = %e, "display name lookup failed");
                format!("User {user_id}")
            }
        }
    }

    /// Whether the pair has an accepted connection request. The REST send
    /// path refuses to relay messages without one.
    pub async fn has_accepted_connection(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<bool, RelayError> {
        let request = self
            .db
            .request_store()
            .get_by_pair(student_id, mentor_id)
            .await?;
        Ok(request.is_some_and(|r| r.status == RequestStatus::Accepted.as_str()))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::Arc;

    use tempfile::NamedTempFile;
    use tokio::sync::mpsc;

    use super::{ChatRelay, RelayError, normalize_pair};
    use crate::config::DatabaseConfig;
    use crate::db::{DatabaseManager, NewUserProfile};
    use crate::lifecycle::SenderRole;
    use crate::relay::frames::{GLOBAL_NOTIFICATIONS_TOPIC, InboundChat, OutboundFrame};
    use crate::relay::topics::TopicRegistry;

    async fn test_relay() -> (ChatRelay, Arc<DatabaseManager>, Arc<TopicRegistry>, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db_path = file.path().to_string_lossy().to_string();

        let config = DatabaseConfig {
            url: None,
            filename: Some(db_path),
            max_connections: Some(1),
            min_connections: Some(1),
        };

        let db = Arc::new(DatabaseManager::new(&config).await.expect("db manager"));
        db.migrate().await.expect("migrate");
        let topics = Arc::new(TopicRegistry::new());
        let relay = ChatRelay::new(db.clone(), topics.clone(), 4096);
        (relay, db, topics, file)
    }

    fn inbound(content: &str, sender_type: &str, sender_id: &str, receiver_id: &str) -> InboundChat {
        InboundChat {
            content: content.to_string(),
            sender_type: sender_type.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
        }
    }

    #[test]
    fn normalization_is_commutative() {
        assert_eq!(normalize_pair(SenderRole::Student, "10", "20"), ("10", "20"));
        assert_eq!(normalize_pair(SenderRole::Mentor, "20", "10"), ("10", "20"));
        assert_eq!(normalize_pair(SenderRole::Admin, "5", "10"), ("10", "5"));
    }

    #[tokio::test]
    async fn first_message_creates_conversation_and_broadcasts() {
        let (relay, db, topics, _file) = test_relay().await;

        db.user_store()
            .create_user(&NewUserProfile {
                user_id: "10".to_string(),
                full_name: "Ada Lovelace".to_string(),
                name: "Ada".to_string(),
                role: "student".to_string(),
            })
            .await
            .expect("create sender");

        let (pair_tx, mut pair_rx) = mpsc::unbounded_channel();
        let (scoped_tx, mut scoped_rx) = mpsc::unbounded_channel();
        let (other_tx, mut other_rx) = mpsc::unbounded_channel();
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel();
        topics.subscribe("chat_10_20", None, pair_tx);
        topics.subscribe(GLOBAL_NOTIFICATIONS_TOPIC, Some("20".to_string()), scoped_tx);
        topics.subscribe(GLOBAL_NOTIFICATIONS_TOPIC, Some("7".to_string()), other_tx);
        topics.subscribe(GLOBAL_NOTIFICATIONS_TOPIC, None, inbox_tx);

        let message = relay
            .send_message(inbound("Hi", "student", "10", "20"))
            .await
            .expect("send");

        assert_eq!(message.seq, 1);
        assert_eq!(message.status, "sent");

        let conversation = db
            .conversation_store()
            .get_by_pair("10", "20")
            .await
            .expect("query pair")
            .expect("conversation created");
        assert_eq!(conversation.student_id, "10");
        assert_eq!(conversation.mentor_id, "20");

        match pair_rx.try_recv().expect("pair topic frame") {
            OutboundFrame::Message { message, .. } => {
                assert_eq!(message.id, 1);
                assert_eq!(message.content, "Hi");
                assert_eq!(message.status, "sent");
            }
            other => panic!("expected message frame, got {other:?}"),
        }

        match scoped_rx.try_recv().expect("notification for 20") {
            OutboundFrame::MessageNotification {
                content,
                receiver_id,
                sender_name,
                ..
            } => {
                assert_eq!(receiver_id, "20");
                assert_eq!(sender_name, "Ada Lovelace");
                assert_eq!(content, "You have a new message from Ada Lovelace");
            }
            other => panic!("expected notification frame, got {other:?}"),
        }

        assert!(other_rx.try_recv().is_err(), "user 7 must not be notified");
        assert!(inbox_rx.try_recv().is_ok(), "unscoped inbox receives all");
    }

    #[tokio::test]
    async fn reply_appends_to_the_same_conversation() {
        let (relay, db, _topics, _file) = test_relay().await;

        relay
            .send_message(inbound("Hi", "student", "10", "20"))
            .await
            .expect("first send");
        let reply = relay
            .send_message(inbound("Hello back", "mentor", "20", "10"))
            .await
            .expect("reply send");

        assert_eq!(reply.seq, 2);

        let conversation = db
            .conversation_store()
            .get_by_pair("10", "20")
            .await
            .expect("query pair")
            .expect("conversation exists");
        let log = db
            .conversation_store()
            .list_messages(conversation.id)
            .await
            .expect("list log");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].seq, 1);
        assert_eq!(log[0].sender_id, "10");
        assert_eq!(log[1].seq, 2);
        assert_eq!(log[1].sender_id, "20");
    }

    #[tokio::test]
    async fn sequential_sends_are_gap_free_and_increasing() {
        let (relay, db, _topics, _file) = test_relay().await;

        for i in 1..=5 {
            let message = relay
                .send_message(inbound(&format!("message {i}"), "student", "10", "20"))
                .await
                .expect("send");
            assert_eq!(message.seq, i);
        }

        let conversation = db
            .conversation_store()
            .get_by_pair("10", "20")
            .await
            .expect("query pair")
            .expect("conversation exists");
        let log = db
            .conversation_store()
            .list_messages(conversation.id)
            .await
            .expect("list log");
        let seqs: Vec<i64> = log.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn unknown_sender_gets_placeholder_name() {
        let (relay, _db, topics, _file) = test_relay().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        topics.subscribe(GLOBAL_NOTIFICATIONS_TOPIC, None, tx);

        relay
            .send_message(inbound("Hi", "student", "10", "20"))
            .await
            .expect("send");

        match rx.try_recv().expect("notification") {
            OutboundFrame::MessageNotification { content, .. } => {
                assert_eq!(content, "You have a new message from User 10");
            }
            other => panic!("expected notification frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_frames_are_rejected_before_any_write() {
        let (relay, db, _topics, _file) = test_relay().await;

        let empty_content = relay
            .send_message(inbound("", "student", "10", "20"))
            .await;
        assert!(matches!(empty_content, Err(RelayError::Validation(_))));

        let bad_role = relay
            .send_message(inbound("Hi", "recruiter", "10", "20"))
            .await;
        assert!(matches!(bad_role, Err(RelayError::Validation(_))));

        let conversation = db
            .conversation_store()
            .get_by_pair("10", "20")
            .await
            .expect("query pair");
        assert!(conversation.is_none(), "no partial state on validation error");
    }

    #[tokio::test]
    async fn accepted_connection_gate() {
        let (relay, db, _topics, _file) = test_relay().await;

        assert!(!relay
            .has_accepted_connection("10", "20")
            .await
            .expect("query"));

        let request = db
            .request_store()
            .create(&crate::db::NewConnectionRequest {
                student_id: "10".to_string(),
                mentor_id: "20".to_string(),
                message: None,
            })
            .await
            .expect("create request");
        assert!(!relay
            .has_accepted_connection("10", "20")
            .await
            .expect("query"));

        db.request_store()
            .update_status(request.id, "pending", "accepted")
            .await
            .expect("accept")
            .expect("was pending");
        assert!(relay
            .has_accepted_connection("10", "20")
            .await
            .expect("query"));
    }
}
