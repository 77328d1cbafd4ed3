use salvo::prelude::*;
use serde_json::json;
use tracing::debug;

use crate::db::NewConnectionRequest;
use crate::lifecycle::RequestStatus;
use crate::relay::{OutboundFrame, mentor_topic, status_topic};
use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn create_request(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<NewConnectionRequest>().await {
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

    let store = web_state().db_manager.request_store();

    // Pre-check keeps the common duplicate case a clean 409; the unique
    // constraint still catches the race underneath.
    match store.get_by_pair(&body.student_id, &body.mentor_id).await {
        Ok(Some(_)) => {
            render_error(
                res,
                StatusCode::CONFLICT,
                "pair already has a connection request",
            );
            return;
        }
        Ok(None) => {}
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
            return;
        }
    }

    match store.create(&body).await {
        Ok(request) => {
            let delivered = web_state().relay.topics().publish(
                &mentor_topic(&request.mentor_id),
                &OutboundFrame::NewRequest {
                    request: request.clone(),
                },
            );
            debug!(request_id = request.id, delivered, "new request announced");

            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "request": request })));
        }
        Err(err) if err.is_conflict() => {
            render_error(
                res,
                StatusCode::CONFLICT,
                "pair already has a connection request",
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
pub async fn get_request(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid request id");
            return;
        }
    };

    match web_state().db_manager.request_store().get_by_id(id).await {
        Ok(Some(request)) => {
            res.render(Json(json!({ "request": request })));
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "connection request not found");
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
pub async fn list_requests_for_mentor(req: &mut Request, res: &mut Response) {
    let mentor_id = match req.param::<String>("mentor_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid mentor id");
            return;
        }
    };

    match web_state()
        .db_manager
        .request_store()
        .list_for_mentor(&mentor_id)
        .await
    {
        Ok(requests) => {
            res.render(Json(json!({
                "requests": requests,
                "count": requests.len(),
            })));
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

async fn resolve_request(req: &mut Request, res: &mut Response, to: RequestStatus) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid request id");
            return;
        }
    };

    let store = web_state().db_manager.request_store();
    let current = match store.get_by_id(id).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "connection request not found");
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

    let from: RequestStatus = match current.status.parse() {
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
            &format!("cannot move request from {} to {}", from, to),
        );
        return;
    }

    match store.update_status(id, from.as_str(), to.as_str()).await {
        Ok(Some(request)) => {
            web_state().relay.topics().publish(
                &status_topic(request.id),
                &OutboundFrame::StatusUpdate {
                    request: request.clone(),
                },
            );

            res.render(Json(json!({ "request": request })));
        }
        // Raced with another resolution between the read and the swap.
        Ok(None) => {
            render_error(res, StatusCode::CONFLICT, "request is no longer pending");
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
pub async fn accept_request(req: &mut Request, res: &mut Response) {
    resolve_request(req, res, RequestStatus::Accepted).await;
}

#[handler]
pub async fn reject_request(req: &mut Request, res: &mut Response) {
    resolve_request(req, res, RequestStatus::Rejected).await;
}
