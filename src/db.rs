pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{
    Booking, ConnectionRequest, Conversation, ConversationMessage, MeetingDetails, NewBooking,
    NewConnectionRequest, NewConversationMessage, NewUserProfile, UserProfile,
};
pub use self::stores::{BookingStore, ConversationStore, RequestStore, UserStore};

pub mod error;
pub mod manager;
pub mod models;
pub mod stores;

#[cfg(feature = "postgres")]
pub mod schema;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub mod schema_sqlite;
