use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::dto::{LoginRequest, RegisterRequest},
    dto::{message, reject, Rejection},
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-token", get(verify_token))
}

fn denied(status: StatusCode, e: AuthError) -> Rejection {
    warn!(error = %e, %status, "auth request denied");
    reject(status, e.message())
}

// Anything that is not an AuthError is hidden behind a fixed message.
fn internal(op: &'static str, rejection: JsonRejection) -> Rejection {
    error!(error = %rejection, op, "unreadable request body");
    reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Bearer token from the `Authorization` header, if one is present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, Rejection> {
    let Json(payload) = payload.map_err(|r| internal("login", r))?;
    let result = state
        .auth
        .login(&payload.email, &payload.password)
        .await
        .map_err(|e| denied(StatusCode::UNAUTHORIZED, e))?;
    info!(user_id = %result.user.id, "user logged in");
    Ok(Json(result).into_response())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, Rejection> {
    let Json(payload) = payload.map_err(|r| internal("register", r))?;
    let user = state
        .auth
        .register(payload.into())
        .await
        .map_err(|e| denied(StatusCode::BAD_REQUEST, e))?;
    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.redacted())).into_response())
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Result<Response, Rejection> {
    state
        .auth
        .logout()
        .await
        .map_err(|e| denied(StatusCode::BAD_REQUEST, e))?;
    Ok(message(StatusCode::OK, "Logged out successfully").into_response())
}

#[instrument(skip_all)]
pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Rejection> {
    let Some(token) = bearer_token(&headers) else {
        warn!("verify-token without a token");
        return Err(reject(StatusCode::UNAUTHORIZED, "No token provided"));
    };
    let user = state
        .auth
        .verify_token(token)
        .await
        .map_err(|e| denied(StatusCode::UNAUTHORIZED, e))?;
    Ok(Json(user.redacted()).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("abc.def")), Some("abc.def"));
    }

    #[test]
    fn missing_or_empty_header_has_no_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
    }
}
