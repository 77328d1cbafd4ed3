use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn get_status(res: &mut Response) {
    let state = web_state();
    let uptime_seconds = state.started_at.elapsed().as_secs();

    let users = state.db_manager.user_store().count_users().await;
    let conversations = state
        .db_manager
        .conversation_store()
        .count_conversations()
        .await;
    let requests = state.db_manager.request_store().count_requests().await;
    let bookings = state.db_manager.booking_store().count_bookings().await;

    match (users, conversations, requests, bookings) {
        (Ok(users), Ok(conversations), Ok(requests), Ok(bookings)) => {
            res.render(Json(json!({
                "relay": {
                    "status": "running",
                    "uptime_seconds": uptime_seconds,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "entities": {
                    "users": users,
                    "conversations": conversations,
                    "connection_requests": requests,
                    "bookings": bookings,
                }
            })));
        }
        _ => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                "database error while collecting status counts",
            );
        }
    }
}
