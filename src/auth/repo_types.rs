use serde::{Deserialize, Serialize};

use crate::users::repo_types::User;

/// Successful sign-in: the account plus the provider's access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub user: User,
    pub token: String,
}

/// Sign-up input. `username` travels to the provider as profile metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub username: String,
}
