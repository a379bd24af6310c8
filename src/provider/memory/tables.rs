use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::provider::{DataProvider, EqFilter};

type Row = Map<String, Value>;

#[derive(Default)]
struct Table {
    unique: Vec<String>,
    rows: Vec<Row>,
}

/// In-process row store. Reports failures with the same status codes and
/// error codes PostgREST uses.
#[derive(Default)]
pub struct MemoryTables {
    tables: RwLock<HashMap<String, Table>>,
}

fn pg_error(status: StatusCode, code: &str, message: String, details: Value) -> AppError {
    AppError::new(status, message.clone()).with_details(json!({
        "code": code,
        "message": message,
        "details": details,
        "hint": null,
    }))
}

fn no_rows() -> AppError {
    pg_error(
        StatusCode::NOT_ACCEPTABLE,
        "PGRST116",
        "JSON object requested, multiple (or no) rows returned".into(),
        json!("The result contains 0 rows"),
    )
}

fn missing_table(table: &str) -> AppError {
    pg_error(
        StatusCode::NOT_FOUND,
        "42P01",
        format!("relation \"public.{}\" does not exist", table),
        Value::Null,
    )
}

fn matches(row: &Row, filter: &EqFilter<'_>) -> bool {
    match row.get(filter.column) {
        Some(Value::String(s)) => s == filter.value,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == filter.value,
    }
}

fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn into_row(value: Value) -> Result<Row, AppError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(pg_error(
            StatusCode::BAD_REQUEST,
            "PGRST102",
            "Request body must be a JSON object".into(),
            other,
        )),
    }
}

impl Table {
    /// Fails when another row (other than `skip`) already holds a unique value of `row`.
    fn check_unique(&self, table: &str, row: &Row, skip: Option<usize>) -> Result<(), AppError> {
        for column in &self.unique {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = self
                .rows
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != skip && r.get(column) == Some(value));
            if taken {
                return Err(pg_error(
                    StatusCode::CONFLICT,
                    "23505",
                    format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        table, column
                    ),
                    json!(format!("Key ({})=({}) already exists.", column, value)),
                ));
            }
        }
        Ok(())
    }

    fn position(&self, filter: &EqFilter<'_>) -> Result<usize, AppError> {
        self.rows
            .iter()
            .position(|r| matches(r, filter))
            .ok_or_else(no_rows)
    }
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `table` with unique constraints on `unique` columns.
    pub fn with_table(mut self, table: &str, unique: &[&str]) -> Self {
        self.tables.get_mut().insert(
            table.to_string(),
            Table {
                unique: unique.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }
}

#[async_trait]
impl DataProvider for MemoryTables {
    async fn select(&self, table: &str, filter: Option<EqFilter<'_>>) -> Result<Vec<Value>, AppError> {
        let tables = self.tables.read().await;
        let t = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(t.rows
            .iter()
            .filter(|r| filter.as_ref().map_or(true, |f| matches(r, f)))
            .cloned()
            .map(Value::Object)
            .collect())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, AppError> {
        let mut row = into_row(row)?;
        let now = now_rfc3339()?;
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        row.entry("updated_at").or_insert_with(|| Value::String(now));

        let mut tables = self.tables.write().await;
        let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        t.check_unique(table, &row, None)?;
        t.rows.push(row.clone());
        debug!(%table, rows = t.rows.len(), "row inserted");
        Ok(Value::Object(row))
    }

    async fn update(&self, table: &str, filter: EqFilter<'_>, patch: Value) -> Result<Value, AppError> {
        let patch = into_row(patch)?;
        let now = now_rfc3339()?;

        let mut tables = self.tables.write().await;
        let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let idx = t.position(&filter)?;

        let mut merged = t.rows[idx].clone();
        merged.extend(patch);
        merged.insert("updated_at".into(), Value::String(now));
        t.check_unique(table, &merged, Some(idx))?;
        t.rows[idx] = merged.clone();
        Ok(Value::Object(merged))
    }

    async fn delete(&self, table: &str, filter: EqFilter<'_>) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let idx = t.position(&filter)?;
        t.rows.remove(idx);
        Ok(())
    }
}
