// SQLite schema definitions
// This file mirrors schema.rs but uses SQLite-compatible types

diesel::table! {
    users (id) {
        id -> Integer,
        user_id -> Text,
        full_name -> Text,
        name -> Text,
        role -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    conversations (id) {
        id -> Integer,
        student_id -> Text,
        mentor_id -> Text,
        created_at -> Text,
        last_activity -> Text,
    }
}

diesel::table! {
    conversation_messages (id) {
        id -> Integer,
        conversation_id -> Integer,
        seq -> Integer,
        sender_type -> Text,
        sender_id -> Text,
        receiver_id -> Text,
        content -> Text,
        status -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    connection_requests (id) {
        id -> Integer,
        student_id -> Text,
        mentor_id -> Text,
        message -> Nullable<Text>,
        status -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    bookings (id) {
        id -> Integer,
        student_id -> Text,
        mentor_id -> Text,
        topic -> Text,
        preferred_date_time -> Text,
        message -> Nullable<Text>,
        status -> Text,
        scheduled_date_time -> Nullable<Text>,
        meeting_link -> Nullable<Text>,
        meeting_id -> Nullable<Text>,
        passcode -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    conversations,
    conversation_messages,
    connection_requests,
    bookings,
);
