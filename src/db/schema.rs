diesel::table! {
    users (id) {
        id -> BigInt,
        user_id -> Text,
        full_name -> Text,
        name -> Text,
        role -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    conversations (id) {
        id -> BigInt,
        student_id -> Text,
        mentor_id -> Text,
        created_at -> Timestamptz,
        last_activity -> Timestamptz,
    }
}

diesel::table! {
    conversation_messages (id) {
        id -> BigInt,
        conversation_id -> BigInt,
        seq -> BigInt,
        sender_type -> Text,
        sender_id -> Text,
        receiver_id -> Text,
        content -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    connection_requests (id) {
        id -> BigInt,
        student_id -> Text,
        mentor_id -> Text,
        message -> Nullable<Text>,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    bookings (id) {
        id -> BigInt,
        student_id -> Text,
        mentor_id -> Text,
        topic -> Text,
        preferred_date_time -> Timestamptz,
        message -> Nullable<Text>,
        status -> Text,
        scheduled_date_time -> Nullable<Timestamptz>,
        meeting_link -> Nullable<Text>,
        meeting_id -> Nullable<Text>,
        passcode -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    conversations,
    conversation_messages,
    connection_requests,
    bookings,
);
