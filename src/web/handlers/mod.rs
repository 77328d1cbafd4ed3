use salvo::http::StatusCode;
use salvo::prelude::*;
use serde_json::json;

pub mod bookings;
pub mod chat;
pub mod conversations;
pub mod health;
pub mod requests;
pub mod users;

pub(crate) fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
}
