use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::schema_sqlite::{
    bookings, connection_requests, conversation_messages, conversations, users,
};

use super::{
    DatabaseError,
    models::{
        Booking, ConnectionRequest, Conversation, ConversationMessage, MeetingDetails, NewBooking,
        NewConnectionRequest, NewConversationMessage, NewUserProfile, UserProfile,
    },
};

/// Appends racing on the same sequence number retry this many times before
/// giving up with a conflict error.
const APPEND_RETRY_LIMIT: u32 = 5;

// Helper function to convert DateTime to ISO string for SQLite
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// Helper function to parse ISO string to DateTime
fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

fn optional_string_to_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    s.map(string_to_datetime).transpose()
}

fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    let mut conn =
        SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))?;
    // Writers from other connections hold the file lock briefly; wait
    // instead of surfacing SQLITE_BUSY.
    diesel::sql_query("PRAGMA busy_timeout = 5000")
        .execute(&mut conn)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    Ok(conn)
}

fn last_insert_rowid(conn: &mut SqliteConnection) -> Result<i32, DatabaseError> {
    diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
        .get_result::<i32>(conn)
        .map_err(|e| DatabaseError::Query(e.to_string()))
}

fn map_write_error(e: diesel::result::Error, what: &str) -> DatabaseError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DatabaseError::Conflict(format!("{what}: {}", info.message()))
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

// SQLite uses i32 for INTEGER (primary keys), but we want to keep i64 in our API
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
struct DbUserProfile {
    id: i32,
    user_id: String,
    full_name: String,
    name: String,
    role: String,
    created_at: String,
}

impl DbUserProfile {
    fn to_user_profile(&self) -> Result<UserProfile, DatabaseError> {
        Ok(UserProfile {
            id: self.id as i64,
            user_id: self.user_id.clone(),
            full_name: self.full_name.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct DbNewUserProfile<'a> {
    user_id: &'a str,
    full_name: &'a str,
    name: &'a str,
    role: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversations)]
struct DbConversation {
    id: i32,
    student_id: String,
    mentor_id: String,
    created_at: String,
    last_activity: String,
}

impl DbConversation {
    fn to_conversation(&self) -> Result<Conversation, DatabaseError> {
        Ok(Conversation {
            id: self.id as i64,
            student_id: self.student_id.clone(),
            mentor_id: self.mentor_id.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            last_activity: string_to_datetime(&self.last_activity)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = conversations)]
struct DbNewConversation<'a> {
    student_id: &'a str,
    mentor_id: &'a str,
    created_at: String,
    last_activity: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversation_messages)]
struct DbConversationMessage {
    id: i32,
    conversation_id: i32,
    seq: i32,
    sender_type: String,
    sender_id: String,
    receiver_id: String,
    content: String,
    status: String,
    created_at: String,
}

impl DbConversationMessage {
    fn to_message(&self) -> Result<ConversationMessage, DatabaseError> {
        Ok(ConversationMessage {
            id: self.id as i64,
            conversation_id: self.conversation_id as i64,
            seq: self.seq as i64,
            sender_type: self.sender_type.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            content: self.content.clone(),
            status: self.status.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = conversation_messages)]
struct DbNewConversationMessage<'a> {
    conversation_id: i32,
    seq: i32,
    sender_type: &'a str,
    sender_id: &'a str,
    receiver_id: &'a str,
    content: &'a str,
    status: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = connection_requests)]
struct DbConnectionRequest {
    id: i32,
    student_id: String,
    mentor_id: String,
    message: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl DbConnectionRequest {
    fn to_request(&self) -> Result<ConnectionRequest, DatabaseError> {
        Ok(ConnectionRequest {
            id: self.id as i64,
            student_id: self.student_id.clone(),
            mentor_id: self.mentor_id.clone(),
            message: self.message.clone(),
            status: self.status.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = connection_requests)]
struct DbNewConnectionRequest<'a> {
    student_id: &'a str,
    mentor_id: &'a str,
    message: Option<&'a str>,
    status: &'a str,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
struct DbBooking {
    id: i32,
    student_id: String,
    mentor_id: String,
    topic: String,
    preferred_date_time: String,
    message: Option<String>,
    status: String,
    scheduled_date_time: Option<String>,
    meeting_link: Option<String>,
    meeting_id: Option<String>,
    passcode: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DbBooking {
    fn to_booking(&self) -> Result<Booking, DatabaseError> {
        Ok(Booking {
            id: self.id as i64,
            student_id: self.student_id.clone(),
            mentor_id: self.mentor_id.clone(),
            topic: self.topic.clone(),
            preferred_date_time: string_to_datetime(&self.preferred_date_time)?,
            message: self.message.clone(),
            status: self.status.clone(),
            scheduled_date_time: optional_string_to_datetime(self.scheduled_date_time.as_deref())?,
            meeting_link: self.meeting_link.clone(),
            meeting_id: self.meeting_id.clone(),
            passcode: self.passcode.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = bookings)]
struct DbNewBooking<'a> {
    student_id: &'a str,
    mentor_id: &'a str,
    topic: &'a str,
    preferred_date_time: String,
    message: Option<&'a str>,
    status: &'a str,
    created_at: String,
    updated_at: String,
}

pub struct SqliteUserStore {
    db_path: Arc<String>,
}

impl SqliteUserStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::UserStore for SqliteUserStore {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let user_id = user_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            users::table
                .filter(users::user_id.eq(user_id))
                .select(DbUserProfile::as_select())
                .first::<DbUserProfile>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|u| u.to_user_profile())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create_user(&self, profile: &NewUserProfile) -> Result<UserProfile, DatabaseError> {
        let profile = profile.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_user = DbNewUserProfile {
                user_id: &profile.user_id,
                full_name: &profile.full_name,
                name: &profile.name,
                role: &profile.role,
                created_at: datetime_to_string(&Utc::now()),
            };

            diesel::insert_into(users::table)
                .values(&new_user)
                .execute(&mut conn)
                .map_err(|e| map_write_error(e, "user already exists"))?;

            let rowid = last_insert_rowid(&mut conn)?;
            users::table
                .filter(users::id.eq(rowid))
                .select(DbUserProfile::as_select())
                .first::<DbUserProfile>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .to_user_profile()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            users::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteConversationStore {
    db_path: Arc<String>,
}

impl SqliteConversationStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

fn get_conversation_by_pair(
    conn: &mut SqliteConnection,
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
impl super::ConversationStore for SqliteConversationStore {
    async fn get_by_pair(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let student_id = student_id.to_string();
        let mentor_id = mentor_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            get_conversation_by_pair(&mut conn, &student_id, &mentor_id)?
                .map(|c| c.to_conversation())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Conversation, DatabaseError> {
        let student_id = student_id.to_string();
        let mentor_id = mentor_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let now = datetime_to_string(&Utc::now());
            let new_conversation = DbNewConversation {
                student_id: &student_id,
                mentor_id: &mentor_id,
                created_at: now.clone(),
                last_activity: now,
            };

            let inserted = diesel::insert_into(conversations::table)
                .values(&new_conversation)
                .execute(&mut conn);

            // A concurrent first message may have won the race; the unique
            // constraint on the pair makes creation idempotent here.
            match inserted {
                Ok(_) => {}
                Err(diesel::result::Error::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    _,
                )) => {}
                Err(e) => return Err(DatabaseError::Query(e.to_string())),
            }

            get_conversation_by_pair(&mut conn, &student_id, &mentor_id)?
                .ok_or_else(|| {
                    DatabaseError::Query("conversation missing after insert".to_string())
                })?
                .to_conversation()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn append_message(
        &self,
        conversation_id: i64,
        message: &NewConversationMessage,
    ) -> Result<ConversationMessage, DatabaseError> {
        let cid = conversation_id as i32;
        let message = message.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;

            for _ in 0..APPEND_RETRY_LIMIT {
                let now = Utc::now();
                // BEGIN IMMEDIATE: take the write lock before reading the
                // log length, so two appends cannot deadlock upgrading.
                let appended: Result<DbConversationMessage, diesel::result::Error> = conn
                    .immediate_transaction(|conn| {
                        let current: i64 = conversation_messages::table
                            .filter(conversation_messages::conversation_id.eq(cid))
                            .count()
                            .get_result(conn)?;
                        let next_seq = (current + 1) as i32;

                        let new_message = DbNewConversationMessage {
                            conversation_id: cid,
                            seq: next_seq,
                            sender_type: &message.sender_type,
                            sender_id: &message.sender_id,
                            receiver_id: &message.receiver_id,
                            content: &message.content,
                            status: "sent",
                            created_at: datetime_to_string(&now),
                        };
                        diesel::insert_into(conversation_messages::table)
                            .values(&new_message)
                            .execute(conn)?;

                        diesel::update(
                            conversations::table.filter(conversations::id.eq(cid)),
                        )
                        .set(conversations::last_activity.eq(datetime_to_string(&now)))
                        .execute(conn)?;

                        conversation_messages::table
                            .filter(conversation_messages::conversation_id.eq(cid))
                            .filter(conversation_messages::seq.eq(next_seq))
                            .select(DbConversationMessage::as_select())
                            .first::<DbConversationMessage>(conn)
                    });

                match appended {
                    Ok(row) => return row.to_message(),
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
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<ConversationMessage>, DatabaseError> {
        let cid = conversation_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = conversation_messages::table
                .filter(conversation_messages::conversation_id.eq(cid))
                .order(conversation_messages::seq.asc())
                .select(DbConversationMessage::as_select())
                .load::<DbConversationMessage>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            rows.iter().map(|m| m.to_message()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, DatabaseError> {
        let user_id = user_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = conversations::table
                .filter(
                    conversations::student_id
                        .eq(&user_id)
                        .or(conversations::mentor_id.eq(&user_id)),
                )
                .order(conversations::last_activity.desc())
                .select(DbConversation::as_select())
                .load::<DbConversation>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            rows.iter().map(|c| c.to_conversation()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_conversations(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            conversations::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteRequestStore {
    db_path: Arc<String>,
}

impl SqliteRequestStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

fn get_request_by_id(
    conn: &mut SqliteConnection,
    request_id: i32,
) -> Result<Option<DbConnectionRequest>, DatabaseError> {
    connection_requests::table
        .filter(connection_requests::id.eq(request_id))
        .select(DbConnectionRequest::as_select())
        .first::<DbConnectionRequest>(conn)
        .optional()
        .map_err(|e| DatabaseError::Query(e.to_string()))
}

#[async_trait]
impl super::RequestStore for SqliteRequestStore {
    async fn create(
        &self,
        request: &NewConnectionRequest,
    ) -> Result<ConnectionRequest, DatabaseError> {
        let request = request.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let now = datetime_to_string(&Utc::now());
            let new_request = DbNewConnectionRequest {
                student_id: &request.student_id,
                mentor_id: &request.mentor_id,
                message: request.message.as_deref(),
                status: "pending",
                created_at: now.clone(),
                updated_at: now,
            };

            diesel::insert_into(connection_requests::table)
                .values(&new_request)
                .execute(&mut conn)
                .map_err(|e| map_write_error(e, "pair already has a connection request"))?;

            let rowid = last_insert_rowid(&mut conn)?;
            get_request_by_id(&mut conn, rowid)?
                .ok_or_else(|| DatabaseError::Query("request missing after insert".to_string()))?
                .to_request()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ConnectionRequest>, DatabaseError> {
        let request_id = id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            get_request_by_id(&mut conn, request_id)?
                .map(|r| r.to_request())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_by_pair(
        &self,
        student_id: &str,
        mentor_id: &str,
    ) -> Result<Option<ConnectionRequest>, DatabaseError> {
        let student_id = student_id.to_string();
        let mentor_id = mentor_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            connection_requests::table
                .filter(connection_requests::student_id.eq(student_id))
                .filter(connection_requests::mentor_id.eq(mentor_id))
                .select(DbConnectionRequest::as_select())
                .first::<DbConnectionRequest>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|r| r.to_request())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn update_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<Option<ConnectionRequest>, DatabaseError> {
        let request_id = id as i32;
        let from = from.to_string();
        let to = to.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let touched = diesel::update(
                connection_requests::table
                    .filter(connection_requests::id.eq(request_id))
                    .filter(connection_requests::status.eq(&from)),
            )
            .set((
                connection_requests::status.eq(&to),
                connection_requests::updated_at.eq(datetime_to_string(&Utc::now())),
            ))
            .execute(&mut conn)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

            if touched == 0 {
                return Ok(None);
            }
            get_request_by_id(&mut conn, request_id)?
                .map(|r| r.to_request())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_for_mentor(
        &self,
        mentor_id: &str,
    ) -> Result<Vec<ConnectionRequest>, DatabaseError> {
        let mentor_id = mentor_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = connection_requests::table
                .filter(connection_requests::mentor_id.eq(mentor_id))
                .order(connection_requests::created_at.desc())
                .select(DbConnectionRequest::as_select())
                .load::<DbConnectionRequest>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            rows.iter().map(|r| r.to_request()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_requests(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            connection_requests::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteBookingStore {
    db_path: Arc<String>,
}

impl SqliteBookingStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

fn get_booking_by_id(
    conn: &mut SqliteConnection,
    booking_id: i32,
) -> Result<Option<DbBooking>, DatabaseError> {
    bookings::table
        .filter(bookings::id.eq(booking_id))
        .select(DbBooking::as_select())
        .first::<DbBooking>(conn)
        .optional()
        .map_err(|e| DatabaseError::Query(e.to_string()))
}

#[async_trait]
impl super::BookingStore for SqliteBookingStore {
    async fn create(&self, booking: &NewBooking) -> Result<Booking, DatabaseError> {
        let booking = booking.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let now = datetime_to_string(&Utc::now());
            let new_booking = DbNewBooking {
                student_id: &booking.student_id,
                mentor_id: &booking.mentor_id,
                topic: &booking.topic,
                preferred_date_time: datetime_to_string(&booking.preferred_date_time),
                message: booking.message.as_deref(),
                status: "pending",
                created_at: now.clone(),
                updated_at: now,
            };

            diesel::insert_into(bookings::table)
                .values(&new_booking)
                .execute(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;

            let rowid = last_insert_rowid(&mut conn)?;
            get_booking_by_id(&mut conn, rowid)?
                .ok_or_else(|| DatabaseError::Query("booking missing after insert".to_string()))?
                .to_booking()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>, DatabaseError> {
        let booking_id = id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            get_booking_by_id(&mut conn, booking_id)?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn update_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<Option<Booking>, DatabaseError> {
        let booking_id = id as i32;
        let from = from.to_string();
        let to = to.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let touched = diesel::update(
                bookings::table
                    .filter(bookings::id.eq(booking_id))
                    .filter(bookings::status.eq(&from)),
            )
            .set((
                bookings::status.eq(&to),
                bookings::updated_at.eq(datetime_to_string(&Utc::now())),
            ))
            .execute(&mut conn)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

            if touched == 0 {
                return Ok(None);
            }
            get_booking_by_id(&mut conn, booking_id)?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn schedule(
        &self,
        id: i64,
        details: &MeetingDetails,
    ) -> Result<Option<Booking>, DatabaseError> {
        let booking_id = id as i32;
        let details = details.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let touched = diesel::update(
                bookings::table
                    .filter(bookings::id.eq(booking_id))
                    .filter(bookings::status.eq("accepted")),
            )
            .set((
                bookings::status.eq("scheduled"),
                bookings::scheduled_date_time
                    .eq(datetime_to_string(&details.scheduled_date_time)),
                bookings::meeting_link.eq(details.meeting_link.as_deref()),
                bookings::meeting_id.eq(details.meeting_id.as_str()),
                bookings::passcode.eq(details.passcode.as_deref()),
                bookings::updated_at.eq(datetime_to_string(&Utc::now())),
            ))
            .execute(&mut conn)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

            if touched == 0 {
                return Ok(None);
            }
            get_booking_by_id(&mut conn, booking_id)?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_for_student(&self, student_id: &str) -> Result<Vec<Booking>, DatabaseError> {
        let student_id = student_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = bookings::table
                .filter(bookings::student_id.eq(student_id))
                .order(bookings::created_at.desc())
                .select(DbBooking::as_select())
                .load::<DbBooking>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            rows.iter().map(|b| b.to_booking()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_for_mentor(&self, mentor_id: &str) -> Result<Vec<Booking>, DatabaseError> {
        let mentor_id = mentor_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = bookings::table
                .filter(bookings::mentor_id.eq(mentor_id))
                .order(bookings::created_at.desc())
                .select(DbBooking::as_select())
                .load::<DbBooking>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            rows.iter().map(|b| b.to_booking()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_bookings(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            bookings::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}
