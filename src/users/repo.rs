use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, instrument};

use super::repo_types::{InsertUser, UpdateUser, User};
use crate::error::{AppError, Result};
use crate::provider::{DataProvider, EqFilter};

const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// User persistence. Provider errors come back unchanged, except that a lookup
/// value the column cannot hold is reported as no match.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create(&self, user: InsertUser) -> Result<User>;
    async fn update(&self, id: &str, user: UpdateUser) -> Result<User>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn find_all(&self) -> Result<Vec<User>>;
}

/// [`UserRepository`] over a [`DataProvider`] table.
pub struct ProviderUserRepository {
    data: Arc<dyn DataProvider>,
    table: String,
}

impl ProviderUserRepository {
    pub fn new(data: Arc<dyn DataProvider>, table: impl Into<String>) -> Self {
        Self {
            data,
            table: table.into(),
        }
    }

    async fn find_one(&self, column: &str, value: &str) -> std::result::Result<Option<User>, AppError> {
        let rows = match self
            .data
            .select(&self.table, Some(EqFilter::new(column, value)))
            .await
        {
            Ok(rows) => rows,
            // a value the column type cannot hold (e.g. a non-uuid id) matches nothing
            Err(e) if e.code() == Some(INVALID_TEXT_REPRESENTATION) => {
                debug!(column, value, "lookup value not representable; no match");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(AppError::from))
            .transpose()
    }
}

fn to_user(row: Value) -> std::result::Result<User, AppError> {
    Ok(serde_json::from_value(row)?)
}

#[async_trait]
impl UserRepository for ProviderUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_one("id", id).await.map_err(|e| {
            error!(error = %e, details = ?e.details, "find_by_id failed");
            e.into()
        })
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", email).await.map_err(|e| {
            error!(error = %e, details = ?e.details, "find_by_email failed");
            e.into()
        })
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: InsertUser) -> Result<User> {
        // credentials belong to the auth provider; the table never holds one
        let row = InsertUser {
            password: String::new(),
            ..user
        };
        let result = match serde_json::to_value(&row) {
            Ok(body) => self.data.insert(&self.table, body).await.and_then(to_user),
            Err(e) => Err(e.into()),
        };
        result.map_err(|e| {
            error!(error = %e, details = ?e.details, "create failed");
            e.into()
        })
    }

    #[instrument(skip(self, user))]
    async fn update(&self, id: &str, user: UpdateUser) -> Result<User> {
        let result = match serde_json::to_value(&user) {
            Ok(patch) => self
                .data
                .update(&self.table, EqFilter::new("id", id), patch)
                .await
                .and_then(to_user),
            Err(e) => Err(e.into()),
        };
        result.map_err(|e| {
            error!(error = %e, details = ?e.details, "update failed");
            e.into()
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        self.data
            .delete(&self.table, EqFilter::new("id", id))
            .await
            .map_err(|e| {
                error!(error = %e, details = ?e.details, "delete failed");
                e.into()
            })
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<User>> {
        let result: std::result::Result<Vec<User>, AppError> =
            match self.data.select(&self.table, None).await {
                Ok(rows) => rows.into_iter().map(to_user).collect(),
                Err(e) => Err(e),
            };
        result.map_err(|e| {
            error!(error = %e, details = ?e.details, "find_all failed");
            e.into()
        })
    }
}
