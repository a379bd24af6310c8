use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Generic application error. `status` is a suggestion; controllers pick the
/// status actually sent to the client.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Provider-side `code` field (e.g. `23505`, `PGRST116`), if any.
    pub fn code(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.get("code"))
            .and_then(Value::as_str)
    }

    pub fn invalid_email() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid email format")
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let status = err
            .status()
            .and_then(|s| StatusCode::from_u16(s.as_u16()).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            format!("malformed provider payload: {}", err),
        )
    }
}

/// Authentication failure. Always constructed with status 401.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AuthError(AppError);

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(AppError::new(StatusCode::UNAUTHORIZED, message))
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn status(&self) -> StatusCode {
        self.0.status
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        err.0
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    App(#[from] AppError),
}

impl Error {
    pub fn message(&self) -> &str {
        match self {
            Error::Auth(e) => e.message(),
            Error::App(e) => &e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_error_always_stores_401() {
        let err = AuthError::new("Registration failed");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Registration failed");
    }

    #[test]
    fn app_error_exposes_provider_code() {
        let err = AppError::new(StatusCode::CONFLICT, "duplicate key value")
            .with_details(json!({ "code": "23505", "hint": null }));
        assert_eq!(err.code(), Some("23505"));
        assert_eq!(Error::from(err).message(), "duplicate key value");
    }
}
