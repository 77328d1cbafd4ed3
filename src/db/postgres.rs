use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use crate::db::manager::Pool;
use crate::db::schema::{bookings, connection_requests, conversation_messages, conversations, users};

use super::{
    DatabaseError,
    models::{
        Booking, ConnectionRequest, Conversation, ConversationMessage, MeetingDetails, NewBooking,
        NewConnectionRequest, NewConversationMessage, NewUserProfile, UserProfile,
    },
};

const APPEND_RETRY_LIMIT: u32 = 5;

fn map_write_error(e: diesel::result::Error, what: &str) -> DatabaseError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DatabaseError::Conflict(format!("{what}: {}", info.message()))
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
struct DbUserProfile {
    id: i64,
    user_id: String,
    full_name: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<DbUserProfile> for UserProfile {
    fn from(value: DbUserProfile) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            full_name: value.full_name,
            name: value.name,
            role: value.role,
            created_at: value.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct DbNewUserProfile<'a> {
    user_id: &'a str,
    full_name: &'a str,
    name: &'a str,
    role: &'a str,
    created_at: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversations)]
struct DbConversation {
    id: i64,
    student_id: String,
    mentor_id: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl From<DbConversation> for Conversation {
    fn from(value: DbConversation) -> Self {
        Self {
            id: value.id,
            student_id: value.student_id,
            mentor_id: value.mentor_id,
            created_at: value.created_at,
            last_activity: value.last_activity,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = conversations)]
struct DbNewConversation<'a> {
    student_id: &'a str,
    mentor_id: &'a str,
    created_at: &'a DateTime<Utc>,
    last_activity: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversation_messages)]
struct DbConversationMessage {
    id: i64,
    conversation_id: i64,
    seq: i64,
    sender_type: String,
    sender_id: String,
    receiver_id: String,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<DbConversationMessage> for ConversationMessage {
    fn from(value: DbConversationMessage) -> Self {
        Self {
            id: value.id,
            conversation_id: value.conversation_id,
            seq: value.seq,
            sender_type: value.sender_type,
            sender_id: value.sender_id,
            receiver_id: value.receiver_id,
            content: value.content,
            status: value.status,
            created_at: value.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = conversation_messages)]
struct DbNewConversationMessage<'a> {
    conversation_id: i64,
    seq: i64,
    sender_type: &'a str,
    sender_id: &'a str,
    receiver_id: &'a str,
    content: &'a str,
    status: &'a str,
    created_at: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = connection_requests)]
struct DbConnectionRequest {
    id: i64,
    student_id: String,
    mentor_id: String,
    message: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbConnectionRequest> for ConnectionRequest {
    fn from(value: DbConnectionRequest) -> Self {
        Self {
            id: value.id,
            student_id: value.student_id,
            mentor_id: value.mentor_id,
            message: value.message,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = connection_requests)]
struct DbNewConnectionRequest<'a> {
    student_id: &'a str,
    mentor_id: &'a str,
    message: Option<&'a str>,
    status: &'a str,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
struct DbBooking {
    id: i64,
    student_id: String,
    mentor_id: String,
    topic: String,
    preferred_date_time: DateTime<Utc>,
    message: Option<String>,
    status: String,
    scheduled_date_time: Option<DateTime<Utc>>,
    meeting_link: Option<String>,
    meeting_id: Option<String>,
    passcode: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbBooking> for Booking {
    fn from(value: DbBooking) -> Self {
        Self {
            id: value.id,
            student_id: value.student_id,
            mentor_id: value.mentor_id,
            topic: value.topic,
            preferred_date_time: value.preferred_date_time,
            message: value.message,
            status: value.status,
            scheduled_date_time: value.scheduled_date_time,
            meeting_link: value.meeting_link,
            meeting_id: value.meeting_id,
            passcode: value.passcode,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = bookings)]
struct DbNewBooking<'a> {
    student_id: &'a str,
    mentor_id: &'a str,
    topic: &'a str,
    preferred_date_time: &'a DateTime<Utc>,
    message: Option<&'a str>,
    status: &'a str,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
}

async fn with_connection<T, F>(pool: Pool, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

pub struct PostgresUserStore {
    pool: Pool,
}

impl PostgresUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::UserStore for PostgresUserStore {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        with_connection(pool, move |conn| {
            users::table
                .filter(users::user_id.eq(user_id))
                .select(DbUserProfile::as_select())
                .first::<DbUserProfile>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn create_user(&self, profile: &NewUserProfile) -> Result<UserProfile, DatabaseError> {
        let pool = self.pool.clone();
        let profile = profile.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            let new_user = DbNewUserProfile {
                user_id: &profile.user_id,
                full_name: &profile.full_name,
                name: &profile.name,
                role: &profile.role,
                created_at: &now,
            };

            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<DbUserProfile>(conn)
                .map(Into::into)
                .map_err(|e| map_write_error(e, "user already exists"))
        })
        .await
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            users::table
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}

pub struct PostgresConversationStore {
    pool: Pool,
}

impl PostgresConversationStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn get_conversation_by_pair(
    conn: &mut PgConnection,
    student: &str,
    mentor: &str,
) -> Result<Option<DbConversation>, DatabaseError> {
    conversations::table
        .filter(conversations::student_id.eq(student))
        .filter(conversations::mentor_id.eq(mentor))
        .select(DbConversation::as_select())
        .first::<DbConversation>(conn)
        .optional()
        .map_err(|e| DatabaseError::Query(e.to_string()))
}

#[async_trait]
impl super::ConversationStore for PostgresConversationStore {
    async fn get_by_pair(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let pool = self.pool.clone();
        let student_id = student_id.to_string();
        let mentor_id = mentor_id.to_string();
        with_connection(pool, move |conn| {
            get_conversation_by_pair(conn, &student_id, &mentor_id)
                .map(|value| value.map(Into::into))
        })
        .await
    }

    async fn create(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Conversation, DatabaseError> {
        let pool = self.pool.clone();
        let student_id = student_id.to_string();
        let mentor_id = mentor_id.to_string();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            let new_conversation = DbNewConversation {
                student_id: &student_id,
                mentor_id: &mentor_id,
                created_at: &now,
                last_activity: &now,
            };

            let inserted = diesel::insert_into(conversations::table)
                .values(&new_conversation)
                .get_result::<DbConversation>(conn);

            // A concurrent first message may have won the race; the unique
            // constraint on the pair makes creation idempotent here.
            match inserted {
                Ok(row) => Ok(row.into()),
                Err(diesel::result::Error::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    _,
                )) => get_conversation_by_pair(conn, &student_id, &mentor_id)?
                    .map(Into::into)
                    .ok_or_else(|| {
                        DatabaseError::Query("conversation missing after insert".to_string())
                    }),
                Err(e) => Err(DatabaseError::Query(e.to_string())),
            }
        })
        .await
    }

    async fn append_message(
        &self,
        conversation_id: i64,
        message: &NewConversationMessage,
    ) -> Result<ConversationMessage, DatabaseError> {
        let pool = self.pool.clone();
        let message = message.clone();
        with_connection(pool, move |conn| {
            for _ in 0..APPEND_RETRY_LIMIT {
                let now = Utc::now();
                let appended: Result<DbConversationMessage, diesel::result::Error> = conn
                    .transaction(|conn| {
                        let current: i64 = conversation_messages::table
                            .filter(
                                conversation_messages::conversation_id.eq(conversation_id),
                            )
                            .count()
                            .get_result(conn)?;

                        let new_message = DbNewConversationMessage {
                            conversation_id,
                            seq: current + 1,
                            sender_type: &message.sender_type,
                            sender_id: &message.sender_id,
                            receiver_id: &message.receiver_id,
                            content: &message.content,
                            status: "sent",
                            created_at: &now,
                        };
                        let row = diesel::insert_into(conversation_messages::table)
                            .values(&new_message)
                            .get_result::<DbConversationMessage>(conn)?;

                        diesel::update(
                            conversations::table.filter(conversations::id.eq(conversation_id)),
                        )
                        .set(conversations::last_activity.eq(now))
                        .execute(conn)?;

                        Ok(row)
                    });

                match appended {
                    Ok(row) => return Ok(row.into()),
                    // Lost the sequence race to a concurrent append; re-read
                    // the log length and try again.
                    Err(diesel::result::Error::DatabaseError(
                        DatabaseErrorKind::UniqueViolation,
                        _,
                    )) => continue,
                    Err(e) => return Err(DatabaseError::Query(e.to_string())),
                }
            }

            Err(DatabaseError::Conflict(format!(
                "append retries exhausted for conversation {conversation_id}"
            )))
        })
        .await
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<ConversationMessage>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            conversation_messages::table
                .filter(conversation_messages::conversation_id.eq(conversation_id))
                .order(conversation_messages::seq.asc())
                .select(DbConversationMessage::as_select())
                .load::<DbConversationMessage>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, DatabaseError> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        with_connection(pool, move |conn| {
            conversations::table
                .filter(
                    conversations::student_id
                        .eq(&user_id)
                        .or(conversations::mentor_id.eq(&user_id)),
                )
                .order(conversations::last_activity.desc())
                .select(DbConversation::as_select())
                .load::<DbConversation>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_conversations(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            conversations::table
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}

pub struct PostgresRequestStore {
    pool: Pool,
}

impl PostgresRequestStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::RequestStore for PostgresRequestStore {
    async fn create(
        &self,
        request: &NewConnectionRequest,
    ) -> Result<ConnectionRequest, DatabaseError> {
        let pool = self.pool.clone();
        let request = request.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            let new_request = DbNewConnectionRequest {
                student_id: &request.student_id,
                mentor_id: &request.mentor_id,
                message: request.message.as_deref(),
                status: "pending",
                created_at: &now,
                updated_at: &now,
            };

            diesel::insert_into(connection_requests::table)
                .values(&new_request)
                .get_result::<DbConnectionRequest>(conn)
                .map(Into::into)
                .map_err(|e| map_write_error(e, "pair already has a connection request"))
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ConnectionRequest>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            connection_requests::table
                .filter(connection_requests::id.eq(id))
                .select(DbConnectionRequest::as_select())
                .first::<DbConnectionRequest>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn get_by_pair(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Option<ConnectionRequest>, DatabaseError> {
        let pool = self.pool.clone();
        let student_id = student_id.to_string();
        let mentor_id = mentor_id.to_string();
        with_connection(pool, move |conn| {
            connection_requests::table
                .filter(connection_requests::student_id.eq(student_id))
                .filter(connection_requests::mentor_id.eq(mentor_id))
                .select(DbConnectionRequest::as_select())
                .first::<DbConnectionRequest>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn update_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<Option<ConnectionRequest>, DatabaseError> {
        let pool = self.pool.clone();
        let from = from.to_string();
        let to = to.to_string();
        with_connection(pool, move |conn| {
            diesel::update(
                connection_requests::table
                    .filter(connection_requests::id.eq(id))
                    .filter(connection_requests::status.eq(&from)),
            )
            .set((
                connection_requests::status.eq(&to),
                connection_requests::updated_at.eq(Utc::now()),
            ))
            .get_result::<DbConnectionRequest>(conn)
            .optional()
            .map(|value| value.map(Into::into))
            .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_for_mentor(
        &self,
        mentor_id: &str,
    ) -> Result<Vec<ConnectionRequest>, DatabaseError> {
        let pool = self.pool.clone();
        let mentor_id = mentor_id.to_string();
        with_connection(pool, move |conn| {
            connection_requests::table
                .filter(connection_requests::mentor_id.eq(mentor_id))
                .order(connection_requests::created_at.desc())
                .select(DbConnectionRequest::as_select())
                .load::<DbConnectionRequest>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_requests(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            connection_requests::table
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}

pub struct PostgresBookingStore {
    pool: Pool,
}

impl PostgresBookingStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::BookingStore for PostgresBookingStore {
    async fn create(&self, booking: &NewBooking) -> Result<Booking, DatabaseError> {
        let pool = self.pool.clone();
        let booking = booking.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            let new_booking = DbNewBooking {
                student_id: &booking.student_id,
                mentor_id: &booking.mentor_id,
                topic: &booking.topic,
                preferred_date_time: &booking.preferred_date_time,
                message: booking.message.as_deref(),
                status: "pending",
                created_at: &now,
                updated_at: &now,
            };

            diesel::insert_into(bookings::table)
                .values(&new_booking)
                .get_result::<DbBooking>(conn)
                .map(Into::into)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            bookings::table
                .filter(bookings::id.eq(id))
                .select(DbBooking::as_select())
                .first::<DbBooking>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn update_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<Option<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        let from = from.to_string();
        let to = to.to_string();
        with_connection(pool, move |conn| {
            diesel::update(
                bookings::table
                    .filter(bookings::id.eq(id))
                    .filter(bookings::status.eq(&from)),
            )
            .set((
                bookings::status.eq(&to),
                bookings::updated_at.eq(Utc::now()),
            ))
            .get_result::<DbBooking>(conn)
            .optional()
            .map(|value| value.map(Into::into))
            .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn schedule(
        &self,
        id: i64,
        details: &MeetingDetails,
    ) -> Result<Option<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        let details = details.clone();
        with_connection(pool, move |conn| {
            diesel::update(
                bookings::table
                    .filter(bookings::id.eq(id))
                    .filter(bookings::status.eq("accepted")),
            )
            .set((
                bookings::status.eq("scheduled"),
                bookings::scheduled_date_time.eq(details.scheduled_date_time),
                bookings::meeting_link.eq(details.meeting_link.as_deref()),
                bookings::meeting_id.eq(details.meeting_id.as_str()),
                bookings::passcode.eq(details.passcode.as_deref()),
                bookings::updated_at.eq(Utc::now()),
            ))
            .get_result::<DbBooking>(conn)
            .optional()
            .map(|value| value.map(Into::into))
            .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_for_student(&self, student_id: &str) -> Result<Vec<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        let student_id = student_id.to_string();
        with_connection(pool, move |conn| {
            bookings::table
                .filter(bookings::student_id.eq(student_id))
                .order(bookings::created_at.desc())
                .select(DbBooking::as_select())
                .load::<DbBooking>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_for_mentor(&self, mentor_id: &str) -> Result<Vec<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        let mentor_id = mentor_id.to_string();
        with_connection(pool, move |conn| {
            bookings::table
                .filter(bookings::mentor_id.eq(mentor_id))
                .order(bookings::created_at.desc())
                .select(DbBooking::as_select())
                .load::<DbBooking>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_bookings(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            bookings::table
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}
