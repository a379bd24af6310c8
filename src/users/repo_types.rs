use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// User row. `password` only ever carries plaintext on the way in; anything
/// handed back to a client goes through [`User::redacted`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,                 // provider-assigned
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl User {
    pub fn redacted(mut self) -> Self {
        self.password.clear();
        self
    }
}

/// Columns needed to create a row; id and timestamps come from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
