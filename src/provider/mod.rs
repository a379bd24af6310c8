//! External identity and persistence provider.
//!
//! The service never stores users or sessions itself. Everything goes through
//! two capability surfaces: [`AuthProvider`] for credentials and sessions,
//! [`DataProvider`] for table rows. [`supabase::SupabaseClient`] talks to a
//! hosted project; [`memory::MemoryAuth`] and [`memory::MemoryTables`] are
//! in-process stand-ins with the same contracts.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::AppError;

/// User record as the Auth Provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Session issued on sign-in. The access token is opaque to this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Result of sign-in / sign-up. The provider may legitimately omit either part
/// (e.g. sign-up on a project that requires email confirmation has no session).
#[derive(Debug, Clone, Default)]
pub struct AuthPayload {
    pub user: Option<ProviderUser>,
    pub session: Option<ProviderSession>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<AuthPayload, AppError>;

    /// `metadata` is stored by the provider as the user's profile data.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthPayload, AppError>;

    /// Ends whatever session the provider client currently carries.
    async fn sign_out(&self) -> Result<(), AppError>;

    async fn get_user(&self, access_token: &str) -> Result<Option<ProviderUser>, AppError>;
}

/// Equality filter on a single column.
#[derive(Debug, Clone, Copy)]
pub struct EqFilter<'a> {
    pub column: &'a str,
    pub value: &'a str,
}

impl<'a> EqFilter<'a> {
    pub fn new(column: &'a str, value: &'a str) -> Self {
        Self { column, value }
    }
}

/// Row-level persistence over JSON objects.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// All rows of `table`, or only those matching `filter`. Unordered.
    async fn select(&self, table: &str, filter: Option<EqFilter<'_>>) -> Result<Vec<Value>, AppError>;

    /// Inserts one row and returns it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, AppError>;

    /// Merges `patch` into exactly one matching row and returns it.
    /// Zero matches is a provider error.
    async fn update(&self, table: &str, filter: EqFilter<'_>, patch: Value) -> Result<Value, AppError>;

    /// Deletes exactly one matching row. Zero matches is a provider error.
    async fn delete(&self, table: &str, filter: EqFilter<'_>) -> Result<(), AppError>;
}
