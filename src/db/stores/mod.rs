use async_trait::async_trait;

use super::DatabaseError;
use super::models::{
    Booking, ConnectionRequest, Conversation, ConversationMessage, MeetingDetails, NewBooking,
    NewConnectionRequest, NewConversationMessage, NewUserProfile, UserProfile,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError>;
    async fn create_user(&self, profile: &NewUserProfile) -> Result<UserProfile, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;
}

/// Conversation lookup, idempotent creation and ordered append.
///
/// `create` must treat a unique-constraint conflict on the pair as "someone
/// else created it first" and return the winning row. `append_message`
/// assigns the next sequence number transactionally and bumps
/// `last_activity` in the same transaction.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_by_pair(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Option<Conversation>, DatabaseError>;
    async fn create(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Conversation, DatabaseError>;
    async fn append_message(
        &self,
        conversation_id: i64,
        message: &NewConversationMessage,
    ) -> Result<ConversationMessage, DatabaseError>;
    async fn list_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<ConversationMessage>, DatabaseError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, DatabaseError>;
    async fn count_conversations(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Returns `DatabaseError::Conflict` when the pair already has a request.
    async fn create(&self, request: &NewConnectionRequest)
        -> Result<ConnectionRequest, DatabaseError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<ConnectionRequest>, DatabaseError>;
    async fn get_by_pair(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Option<ConnectionRequest>, DatabaseError>;
    /// Compare-and-swap status update: only rows currently in `from` are
    /// touched. `None` means the request was missing or not in `from`.
    async fn update_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<Option<ConnectionRequest>, DatabaseError>;
    async fn list_for_mentor(&self, mentor_id: &str)
        -> Result<Vec<ConnectionRequest>, DatabaseError>;
    async fn count_requests(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, booking: &NewBooking) -> Result<Booking, DatabaseError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>, DatabaseError>;
    /// Compare-and-swap status update, same contract as
    /// `RequestStore::update_status`.
    async fn update_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<Option<Booking>, DatabaseError>;
    /// Moves an accepted booking to scheduled and records meeting metadata.
    /// `None` means the booking was missing or not in the accepted state.
    async fn schedule(
        &self,
        id: i64,
        details: &MeetingDetails,
    ) -> Result<Option<Booking>, DatabaseError>;
    async fn list_for_student(&self, student_id: &str) -> Result<Vec<Booking>, DatabaseError>;
    async fn list_for_mentor(&self, mentor_id: &str) -> Result<Vec<Booking>, DatabaseError>;
    async fn count_bookings(&self) -> Result<i64, DatabaseError>;
}
