use salvo::prelude::*;
use serde_json::json;

use crate::db::NewUserProfile;
use crate::lifecycle::SenderRole;
use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn create_user(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<NewUserProfile>().await {
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

    if body.user_id.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "user_id is required");
        return;
    }
    if body.role.parse::<SenderRole>().is_err() {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            &format!("unknown role: {}", body.role),
        );
        return;
    }

    match web_state().db_manager.user_store().create_user(&body).await {
        Ok(profile) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "user": profile })));
        }
        Err(err) if err.is_conflict() => {
            render_error(res, StatusCode::CONFLICT, "user already exists");
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
pub async fn get_user(req: &mut Request, res: &mut Response) {
    let user_id = match req.param::<String>("user_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };

    match web_state()
        .db_manager
        .user_store()
        .get_by_user_id(&user_id)
        .await
    {
        Ok(Some(profile)) => {
            res.render(Json(json!({ "user": profile })));
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "user not found");
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
