use serde::Deserialize;

use super::repo_types::NewAccount;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: String,
}

impl From<RegisterRequest> for NewAccount {
    fn from(req: RegisterRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            username: req.username,
        }
    }
}
