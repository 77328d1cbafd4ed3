use crate::config::{DatabaseConfig as ConfigDatabaseConfig, DbType as ConfigDbType};
use crate::db::{BookingStore, ConversationStore, DatabaseError, RequestStore, UserStore};
use std::sync::Arc;

#[cfg(feature = "postgres")]
use crate::db::postgres::{
    PostgresBookingStore, PostgresConversationStore, PostgresRequestStore, PostgresUserStore,
};
#[cfg(feature = "postgres")]
use diesel::RunQueryDsl;
#[cfg(feature = "postgres")]
use diesel::pg::PgConnection;
#[cfg(feature = "postgres")]
use diesel::r2d2::{self, ConnectionManager};

#[cfg(feature = "postgres")]
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{
    SqliteBookingStore, SqliteConversationStore, SqliteRequestStore, SqliteUserStore,
};
#[cfg(feature = "sqlite")]
use diesel::Connection;
#[cfg(feature = "sqlite")]
use diesel::RunQueryDsl as _;
#[cfg(feature = "sqlite")]
use diesel::sqlite::SqliteConnection;

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "postgres")]
    postgres_pool: Option<Pool>,
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<String>,
    user_store: Arc<dyn UserStore>,
    conversation_store: Arc<dyn ConversationStore>,
    request_store: Arc<dyn RequestStore>,
    booking_store: Arc<dyn BookingStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Postgres => DbType::Postgres,
            ConfigDbType::Sqlite => DbType::Sqlite,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &ConfigDatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let connection_string = config.connection_string();
                let max_connections = config.max_connections();
                let min_connections = config.min_connections();

                let manager = ConnectionManager::<PgConnection>::new(connection_string);

                let builder = r2d2::Pool::builder()
                    .max_size(max_connections.unwrap_or(10))
                    .min_idle(Some(min_connections.unwrap_or(1)));

                let pool = builder
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                let user_store = Arc::new(PostgresUserStore::new(pool.clone()));
                let conversation_store = Arc::new(PostgresConversationStore::new(pool.clone()));
                let request_store = Arc::new(PostgresRequestStore::new(pool.clone()));
                let booking_store = Arc::new(PostgresBookingStore::new(pool.clone()));

                Ok(Self {
                    postgres_pool: Some(pool),
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    user_store,
                    conversation_store,
                    request_store,
                    booking_store,
                    db_type,
                })
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config
                    .sqlite_path()
                    .ok_or_else(|| DatabaseError::Connection("missing sqlite path".to_string()))?;
                let path_arc = Arc::new(path.clone());

                let user_store = Arc::new(SqliteUserStore::new(path_arc.clone()));
                let conversation_store =
                    Arc::new(SqliteConversationStore::new(path_arc.clone()));
                let request_store = Arc::new(SqliteRequestStore::new(path_arc.clone()));
                let booking_store = Arc::new(SqliteBookingStore::new(path_arc));

                Ok(Self {
                    #[cfg(feature = "postgres")]
                    postgres_pool: None,
                    sqlite_path: Some(path),
                    user_store,
                    conversation_store,
                    request_store,
                    booking_store,
                    db_type,
                })
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Connection(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let pool = self.postgres_pool.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("postgres pool not initialized".to_string())
                })?;
                Self::migrate_postgres(pool).await
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self.sqlite_path.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("sqlite path not initialized".to_string())
                })?;
                Self::migrate_sqlite(path).await
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Migration(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "postgres")]
    async fn migrate_postgres(pool: &Pool) -> Result<(), DatabaseError> {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id BIGSERIAL PRIMARY KEY,
                    user_id TEXT NOT NULL UNIQUE,
                    full_name TEXT NOT NULL DEFAULT '',
                    name TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL DEFAULT 'student',
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS conversations (
                    id BIGSERIAL PRIMARY KEY,
                    student_id TEXT NOT NULL,
                    mentor_id TEXT NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    last_activity TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    UNIQUE (student_id, mentor_id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS conversation_messages (
                    id BIGSERIAL PRIMARY KEY,
                    conversation_id BIGINT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                    seq BIGINT NOT NULL,
                    sender_type TEXT NOT NULL,
                    sender_id TEXT NOT NULL,
                    receiver_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'sent',
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    UNIQUE (conversation_id, seq)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS connection_requests (
                    id BIGSERIAL PRIMARY KEY,
                    student_id TEXT NOT NULL,
                    mentor_id TEXT NOT NULL,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    UNIQUE (student_id, mentor_id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id BIGSERIAL PRIMARY KEY,
                    student_id TEXT NOT NULL,
                    mentor_id TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    preferred_date_time TIMESTAMP WITH TIME ZONE NOT NULL,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    scheduled_date_time TIMESTAMP WITH TIME ZONE,
                    meeting_link TEXT,
                    meeting_id TEXT,
                    passcode TEXT,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_users_user_id ON users(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON conversation_messages(conversation_id)",
                "CREATE INDEX IF NOT EXISTS idx_requests_mentor ON connection_requests(mentor_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_student ON bookings(student_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_mentor ON bookings(mentor_id)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(feature = "sqlite")]
    async fn migrate_sqlite(path: &str) -> Result<(), DatabaseError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL UNIQUE,
                    full_name TEXT NOT NULL DEFAULT '',
                    name TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL DEFAULT 'student',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS conversations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    student_id TEXT NOT NULL,
                    mentor_id TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    last_activity TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (student_id, mentor_id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS conversation_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                    seq INTEGER NOT NULL,
                    sender_type TEXT NOT NULL,
                    sender_id TEXT NOT NULL,
                    receiver_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'sent',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (conversation_id, seq)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS connection_requests (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    student_id TEXT NOT NULL,
                    mentor_id TEXT NOT NULL,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (student_id, mentor_id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    student_id TEXT NOT NULL,
                    mentor_id TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    preferred_date_time TEXT NOT NULL,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    scheduled_date_time TEXT,
                    meeting_link TEXT,
                    meeting_id TEXT,
                    passcode TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON conversation_messages(conversation_id)",
                "CREATE INDEX IF NOT EXISTS idx_requests_mentor ON connection_requests(mentor_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_student ON bookings(student_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_mentor ON bookings(mentor_id)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn user_store(&self) -> Arc<dyn UserStore> {
        self.user_store.clone()
    }

    pub fn conversation_store(&self) -> Arc<dyn ConversationStore> {
        self.conversation_store.clone()
    }

    pub fn request_store(&self) -> Arc<dyn RequestStore> {
        self.request_store.clone()
    }

    pub fn booking_store(&self) -> Arc<dyn BookingStore> {
        self.booking_store.clone()
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::NamedTempFile;

    use super::DatabaseManager;
    use crate::config::DatabaseConfig;
    use crate::db::models::{MeetingDetails, NewBooking, NewConnectionRequest, NewUserProfile};

    async fn test_manager() -> (DatabaseManager, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db_path = file.path().to_string_lossy().to_string();

        let config = DatabaseConfig {
            url: None,
            filename: Some(db_path),
            max_connections: Some(1),
            min_connections: Some(1),
        };

        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        (manager, file)
    }

    #[tokio::test]
    async fn user_roundtrip_and_duplicate_conflict() {
        let (manager, _file) = test_manager().await;
        let store = manager.user_store();

        let created = store
            .create_user(&NewUserProfile {
                user_id: "10".to_string(),
                full_name: "Ada Lovelace".to_string(),
                name: "Ada".to_string(),
                role: "student".to_string(),
            })
            .await
            .expect("create user");
        assert!(created.id > 0);

        let fetched = store
            .get_by_user_id("10")
            .await
            .expect("query user")
            .expect("user exists");
        assert_eq!(fetched.full_name, "Ada Lovelace");
        assert_eq!(fetched.display_name(), "Ada Lovelace");

        let duplicate = store
            .create_user(&NewUserProfile {
                user_id: "10".to_string(),
                full_name: String::new(),
                name: String::new(),
                role: "student".to_string(),
            })
            .await;
        assert!(duplicate.is_err_and(|e| e.is_conflict()));
    }

    #[tokio::test]
    async fn conversation_creation_is_idempotent_per_pair() {
        let (manager, _file) = test_manager().await;
        let store = manager.conversation_store();

        let first = store.create("10", "20").await.expect("first create");
        let second = store.create("10", "20").await.expect("second create");
        assert_eq!(first.id, second.id);

        let fetched = store
            .get_by_pair("10", "20")
            .await
            .expect("query pair")
            .expect("conversation exists");
        assert_eq!(fetched.id, first.id);
        assert_eq!(store.count_conversations().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_assign_distinct_sequence_numbers() {
        let (manager, _file) = test_manager().await;
        let store = manager.conversation_store();

        let conversation = store.create("10", "20").await.expect("create conversation");

        let message = |content: &str| crate::db::models::NewConversationMessage {
            sender_type: "student".to_string(),
            sender_id: "10".to_string(),
            receiver_id: "20".to_string(),
            content: content.to_string(),
        };

        let first = message("first");
        let second = message("second");
        let (a, b) = tokio::join!(
            store.append_message(conversation.id, &first),
            store.append_message(conversation.id, &second),
        );
        let a = a.expect("first append");
        let b = b.expect("second append");

        let mut seqs = vec![a.seq, b.seq];
        seqs.sort_unstable();
        assert_eq!(seqs, vec![1, 2]);

        let log = store
            .list_messages(conversation.id)
            .await
            .expect("list log");
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn connection_request_status_is_compare_and_swap() {
        let (manager, _file) = test_manager().await;
        let store = manager.request_store();

        let request = store
            .create(&NewConnectionRequest {
                student_id: "10".to_string(),
                mentor_id: "20".to_string(),
                message: Some("please mentor me".to_string()),
            })
            .await
            .expect("create request");
        assert_eq!(request.status, "pending");

        let duplicate = store
            .create(&NewConnectionRequest {
                student_id: "10".to_string(),
                mentor_id: "20".to_string(),
                message: None,
            })
            .await;
        assert!(duplicate.is_err_and(|e| e.is_conflict()));

        let accepted = store
            .update_status(request.id, "pending", "accepted")
            .await
            .expect("accept")
            .expect("request was pending");
        assert_eq!(accepted.status, "accepted");

        // Second transition from pending must not match anything.
        let rejected = store
            .update_status(request.id, "pending", "rejected")
            .await
            .expect("reject attempt");
        assert!(rejected.is_none());
    }

    #[tokio::test]
    async fn booking_schedule_requires_accepted_state() {
        let (manager, _file) = test_manager().await;
        let store = manager.booking_store();

        let booking = store
            .create(&NewBooking {
                student_id: "10".to_string(),
                mentor_id: "20".to_string(),
                topic: "systems design".to_string(),
                preferred_date_time: Utc::now() + Duration::days(2),
                message: None,
            })
            .await
            .expect("create booking");
        assert_eq!(booking.status, "pending");

        let details = MeetingDetails {
            scheduled_date_time: Utc::now() + Duration::days(3),
            meeting_link: Some("https://meet.example.org/abc".to_string()),
            meeting_id: "abc".to_string(),
            passcode: None,
        };

        // Still pending: scheduling must not match.
        let premature = store.schedule(booking.id, &details).await.expect("schedule");
        assert!(premature.is_none());

        store
            .update_status(booking.id, "pending", "accepted")
            .await
            .expect("accept")
            .expect("booking was pending");

        let scheduled = store
            .schedule(booking.id, &details)
            .await
            .expect("schedule")
            .expect("booking was accepted");
        assert_eq!(scheduled.status, "scheduled");
        assert_eq!(scheduled.meeting_id.as_deref(), Some("abc"));
        assert!(scheduled.scheduled_date_time.is_some());
    }
}
