use salvo::prelude::*;

use crate::web::handlers::{
    bookings::{
        accept_booking, cancel_booking, complete_booking, create_booking, get_booking,
        list_bookings_for_mentor, list_bookings_for_student, reject_booking, schedule_booking,
    },
    chat::{chat_connect, mentor_connect, notifications_connect, status_connect},
    conversations::{conversation_messages, list_conversations, send_message},
    health::{get_status, health_check},
    requests::{accept_request, create_request, get_request, list_requests_for_mentor, reject_request},
    users::{create_user, get_user},
};

pub fn create_router() -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(
            Router::with_path("api")
                .push(Router::with_path("users").post(create_user))
                .push(Router::with_path("users/{user_id}").get(get_user))
                .push(Router::with_path("conversations/{user_id}").get(list_conversations))
                .push(
                    Router::with_path("conversations/{student_id}/{mentor_id}/messages")
                        .get(conversation_messages),
                )
                .push(Router::with_path("messages").post(send_message))
                .push(Router::with_path("requests").post(create_request))
                .push(Router::with_path("requests/mentor/{mentor_id}").get(list_requests_for_mentor))
                .push(Router::with_path("requests/{id}").get(get_request))
                .push(Router::with_path("requests/{id}/accept").post(accept_request))
                .push(Router::with_path("requests/{id}/reject").post(reject_request))
                .push(Router::with_path("bookings").post(create_booking))
                .push(Router::with_path("bookings/student/{student_id}").get(list_bookings_for_student))
                .push(Router::with_path("bookings/mentor/{mentor_id}").get(list_bookings_for_mentor))
                .push(Router::with_path("bookings/{id}").get(get_booking))
                .push(Router::with_path("bookings/{id}/accept").post(accept_booking))
                .push(Router::with_path("bookings/{id}/reject").post(reject_booking))
                .push(Router::with_path("bookings/{id}/schedule").post(schedule_booking))
                .push(Router::with_path("bookings/{id}/complete").post(complete_booking))
                .push(Router::with_path("bookings/{id}/cancel").post(cancel_booking)),
        )
        .push(
            Router::with_path("ws")
                .push(Router::with_path("chat/{sender_id}/{receiver_id}").goal(chat_connect))
                .push(Router::with_path("notifications").goal(notifications_connect))
                .push(Router::with_path("notifications/{user_id}").goal(notifications_connect))
                .push(Router::with_path("mentors/{mentor_id}").goal(mentor_connect))
                .push(Router::with_path("status/{request_id}").goal(status_connect)),
        )
}
