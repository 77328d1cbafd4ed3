use chrono::{DateTime, Utc};
use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::{MeetingDetails, NewBooking};
use crate::lifecycle::BookingStatus;
use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn create_booking(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<NewBooking>().await {
        Ok(body) => body,
        Err(err) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", err),
            );
            return;
        }
    };

    if body.student_id.is_empty() || body.mentor_id.is_empty() {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "student_id and mentor_id are required",
        );
        return;
    }
    if body.topic.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "topic is required");
        return;
    }

    match web_state().db_manager.booking_store().create(&body).await {
        Ok(booking) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "booking": booking })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn get_booking(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    match web_state().db_manager.booking_store().get_by_id(id).await {
        Ok(Some(booking)) => {
            res.render(Json(json!({ "booking": booking })));
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "booking not found");
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn list_bookings_for_student(req: &mut Request, res: &mut Response) {
    let student_id = match req.param::<String>("student_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid student id");
            return;
        }
    };

    match web_state()
        .db_manager
        .booking_store()
        .list_for_student(&student_id)
        .await
    {
        Ok(bookings) => {
            res.render(Json(json!({ "bookings": bookings, "count": bookings.len() })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn list_bookings_for_mentor(req: &mut Request, res: &mut Response) {
    let mentor_id = match req.param::<String>("mentor_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid mentor id");
            return;
        }
    };

    match web_state()
        .db_manager
        .booking_store()
        .list_for_mentor(&mentor_id)
        .await
    {
        Ok(bookings) => {
            res.render(Json(json!({ "bookings": bookings, "count": bookings.len() })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

async fn transition_booking(req: &mut Request, res: &mut Response, to: BookingStatus) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    let store = web_state().db_manager.booking_store();
    let current = match store.get_by_id(id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "booking not found");
            return;
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
            return;
        }
    };

    let from: BookingStatus = match current.status.parse() {
        Ok(status) => status,
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err);
            return;
        }
    };
    if !from.can_transition(to) {
        render_error(
            res,
            StatusCode::CONFLICT,
            &format!("cannot move booking from {} to {}", from, to),
        );
        return;
    }

    match store.update_status(id, from.as_str(), to.as_str()).await {
        Ok(Some(booking)) => {
            res.render(Json(json!({ "booking": booking })));
        }
        // Raced with a concurrent transition between the read and the swap.
        Ok(None) => {
            render_error(
                res,
                StatusCode::CONFLICT,
                &format!("booking is no longer {}", from),
            );
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn accept_booking(req: &mut Request, res: &mut Response) {
    transition_booking(req, res, BookingStatus::Accepted).await;
}

#[handler]
pub async fn reject_booking(req: &mut Request, res: &mut Response) {
    transition_booking(req, res, BookingStatus::Rejected).await;
}

#[handler]
pub async fn complete_booking(req: &mut Request, res: &mut Response) {
    transition_booking(req, res, BookingStatus::Completed).await;
}

#[handler]
pub async fn cancel_booking(req: &mut Request, res: &mut Response) {
    transition_booking(req, res, BookingStatus::Cancelled).await;
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    scheduled_date_time: Option<DateTime<Utc>>,
    meeting_link: Option<String>,
    meeting_id: Option<String>,
    passcode: Option<String>,
}

/// Moving accepted -> scheduled requires a date; the meeting id is generated
/// when the mentor does not bring one.
#[handler]
pub async fn schedule_booking(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    let body = match req.parse_json::<ScheduleBody>().await {
        Ok(body) => body,
        Err(err) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", err),
            );
            return;
        }
    };

    let Some(scheduled_date_time) = body.scheduled_date_time else {
        render_error(res, StatusCode::BAD_REQUEST, "scheduled_date_time is required");
        return;
    };

    let store = web_state().db_manager.booking_store();
    match store.get_by_id(id).await {
        Ok(Some(booking)) => {
            if booking.status != BookingStatus::Accepted.as_str() {
                render_error(
                    res,
                    StatusCode::CONFLICT,
                    &format!("cannot schedule a booking in state {}", booking.status),
                );
                return;
            }
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "booking not found");
            return;
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
            return;
        }
    }

    let details = MeetingDetails {
        scheduled_date_time,
        meeting_link: body.meeting_link,
        meeting_id: body
            .meeting_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        passcode: body.passcode,
    };

    match store.schedule(id, &details).await {
        Ok(Some(booking)) => {
            res.render(Json(json!({ "booking": booking })));
        }
        Ok(None) => {
            render_error(res, StatusCode::CONFLICT, "booking is no longer accepted");
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}
