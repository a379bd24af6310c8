use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// `{ "error": ... }` body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `{ "message": ... }` confirmation / not-found body.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

pub type Rejection = (StatusCode, Json<ErrorBody>);

pub fn reject(status: StatusCode, error: impl Into<String>) -> Rejection {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
}

pub fn message(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<MessageBody>) {
    (
        status,
        Json(MessageBody {
            message: message.into(),
        }),
    )
}
