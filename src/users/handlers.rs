use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::repo_types::{InsertUser, UpdateUser};
use crate::{
    dto::{message, reject, Rejection},
    error::Error,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(get_all_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user_by_id).patch(update_user).delete(delete_user),
        )
        .route("/users/email/:email", get(get_user_by_email))
}

// Every failure on the user endpoints is a 500 carrying the error's own message.
fn failed(op: &'static str, e: Error) -> Rejection {
    error!(error = %e, op, "user request failed");
    reject(StatusCode::INTERNAL_SERVER_ERROR, e.message())
}

fn bad_body(op: &'static str, rejection: JsonRejection) -> Rejection {
    error!(error = %rejection, op, "unreadable request body");
    reject(StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text())
}

fn not_found() -> Response {
    message(StatusCode::NOT_FOUND, "User not found").into_response()
}

#[instrument(skip(state))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Rejection> {
    match state.users.get_user(&id).await {
        Ok(Some(user)) => Ok(Json(user.redacted()).into_response()),
        Ok(None) => {
            warn!(%id, "user not found");
            Ok(not_found())
        }
        Err(e) => Err(failed("get_user_by_id", e)),
    }
}

#[instrument(skip(state))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Response, Rejection> {
    if email.trim().is_empty() {
        return Ok(message(StatusCode::BAD_REQUEST, "Email is required").into_response());
    }
    match state.users.get_user_by_email(&email).await {
        Ok(Some(user)) => Ok(Json(user.redacted()).into_response()),
        Ok(None) => {
            warn!(%email, "user not found");
            Ok(not_found())
        }
        Err(e) => Err(failed("get_user_by_email", e)),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<InsertUser>, JsonRejection>,
) -> Result<Response, Rejection> {
    let Json(payload) = payload.map_err(|r| bad_body("create_user", r))?;
    let user = state
        .users
        .create_user(payload)
        .await
        .map_err(|e| failed("create_user", e))?;
    Ok((StatusCode::CREATED, Json(user.redacted())).into_response())
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Response, Rejection> {
    let Json(payload) = payload.map_err(|r| bad_body("update_user", r))?;
    let user = state
        .users
        .update_user(&id, payload)
        .await
        .map_err(|e| failed("update_user", e))?;
    Ok(Json(user.redacted()).into_response())
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Rejection> {
    state
        .users
        .delete_user(&id)
        .await
        .map_err(|e| failed("delete_user", e))?;
    Ok(message(StatusCode::OK, "User deleted").into_response())
}

#[instrument(skip(state))]
pub async fn get_all_users(State(state): State<AppState>) -> Result<Response, Rejection> {
    let users = state
        .users
        .get_all_users()
        .await
        .map_err(|e| failed("get_all_users", e))?;
    let users: Vec<_> = users.into_iter().map(|u| u.redacted()).collect();
    Ok(Json(users).into_response())
}
