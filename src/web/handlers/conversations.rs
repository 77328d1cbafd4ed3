use salvo::prelude::*;
use serde_json::json;

use crate::lifecycle::SenderRole;
use crate::relay::{InboundChat, RelayError, WireMessage, normalize_pair};
use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn list_conversations(req: &mut Request, res: &mut Response) {
    let user_id = match req.param::<String>("user_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };

    match web_state()
        .db_manager
        .conversation_store()
        .list_for_user(&user_id)
        .await
    {
        Ok(conversations) => {
            res.render(Json(json!({
                "conversations": conversations,
                "count": conversations.len(),
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

#[handler]
pub async fn conversation_messages(req: &mut Request, res: &mut Response) {
    let student_id = match req.param::<String>("student_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid student id");
            return;
        }
    };
    let mentor_id = match req.param::<String>("mentor_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid mentor id");
            return;
        }
    };

    let state = web_state();
    let limit = req
        .query::<i64>("limit")
        .unwrap_or(state.config.relay.history_page_size)
        .clamp(1, 1000) as usize;

    let store = state.db_manager.conversation_store();
    let conversation = match store.get_by_pair(&student_id, &mentor_id).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "conversation not found");
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

    match store.list_messages(conversation.id).await {
        Ok(messages) => {
            // Most recent page of the log, still in ascending order.
            let start = messages.len().saturating_sub(limit);
            let wire: Vec<WireMessage> =
                messages[start..].iter().map(WireMessage::from).collect();
            res.render(Json(json!({
                "conversation": conversation,
                "messages": wire,
                "total": messages.len(),
                "count": wire.len(),
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

/// REST send path. Unlike the WebSocket relay it verifies that the pair has
/// an accepted connection request before relaying anything.
#[handler]
pub async fn send_message(req: &mut Request, res: &mut Response) {
    let inbound = match req.parse_json::<InboundChat>().await {
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

    let role: SenderRole = match inbound.sender_type.parse() {
        Ok(role) => role,
        Err(err) => {
            render_error(res, StatusCode::BAD_REQUEST, &err);
            return;
        }
    };
    let (student_id, mentor_id) = normalize_pair(role, &inbound.sender_id, &inbound.receiver_id);

    let relay = web_state().relay.clone();
    match relay.has_accepted_connection(student_id, mentor_id).await {
        Ok(true) => {}
        Ok(false) => {
            render_error(
                res,
                StatusCode::FORBIDDEN,
                "no accepted connection between sender and receiver",
            );
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

    match relay.send_message(inbound).await {
        Ok(message) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "message": WireMessage::from(&message) })));
        }
        Err(RelayError::Validation(reason)) => {
            render_error(res, StatusCode::BAD_REQUEST, &reason);
        }
        Err(RelayError::Database(err)) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}
