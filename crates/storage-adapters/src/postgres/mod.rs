//! # PostgreSQL repositories
//!
//! Maps the domain aggregates onto the tables in `migrations/`. Every row
//! stores the full aggregate as JSONB in `doc`; key and filter columns are
//! written alongside it so lookups and uniqueness stay in the database.
//!
//! Unique violations (SQLSTATE 23505) surface as `AppError::Conflict`.

mod academics;
mod inbox;
mod people;

use std::sync::Arc;

use async_trait::async_trait;
use domains::models::Page;
use domains::ports::{IdSequence, Repositories};
use domains::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{error, info};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies any pending migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            students: self.clone(),
            teachers: self.clone(),
            parents: self.clone(),
            subjects: self.clone(),
            assignments: self.clone(),
            attendance: self.clone(),
            results: self.clone(),
            notifications: self.clone(),
            sequences: self.clone(),
        }
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    error!(error = %e, "database error");
    AppError::Internal(format!("database: {e}"))
}

/// Like [`db_err`], but a unique violation becomes `Conflict(message)`.
fn write_err(message: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| match e.as_database_error().and_then(|d| d.code()) {
        Some(code) if code == UNIQUE_VIOLATION => AppError::Conflict(message.to_string()),
        _ => db_err(e),
    }
}

fn doc<T: DeserializeOwned>(row: &PgRow) -> Result<T> {
    row.try_get::<Json<T>, _>("doc")
        .map(|j| j.0)
        .map_err(db_err)
}

fn docs<T: DeserializeOwned>(rows: &[PgRow]) -> Result<Vec<T>> {
    rows.iter().map(doc).collect()
}

/// Wraps `matched` (a filtered `SELECT doc, <sort columns> ..`) so a single
/// row carries the requested slice as `docs` and the full match count as
/// `total`. LIMIT and OFFSET bind to `$limit_arg` and the one after it.
fn page_sql(matched: &str, order: &str, limit_arg: usize) -> String {
    format!(
        "WITH matched AS ({matched})
         SELECT (SELECT COUNT(*) FROM matched) AS total,
                COALESCE(
                    (SELECT jsonb_agg(slice.doc ORDER BY {order})
                     FROM (SELECT * FROM matched ORDER BY {order}
                           LIMIT ${limit_arg} OFFSET ${offset_arg}) AS slice),
                    '[]'::jsonb) AS docs",
        offset_arg = limit_arg + 1,
    )
}

/// Reads the row produced by a [`page_sql`] query.
fn paged<T: DeserializeOwned>(row: &PgRow, page: domains::models::PageRequest) -> Result<Page<T>> {
    let total = row.try_get::<i64, _>("total").map_err(db_err)?;
    let items = row
        .try_get::<Json<Vec<T>>, _>("docs")
        .map(|j| j.0)
        .map_err(db_err)?;
    Ok(Page::new(items, total.max(0) as u64, page))
}

/// The serialized form of a unit enum variant, e.g. `on_leave`.
fn enum_str<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(AppError::Internal(format!("expected string enum, got {other}"))),
    }
}

#[async_trait]
impl IdSequence for PgStore {
    async fn next(&self, key: &str) -> Result<u64> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO id_sequences (key, value) VALUES ($1, 1)
             ON CONFLICT (key) DO UPDATE SET value = id_sequences.value + 1
             RETURNING value",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::models::{Term, TeacherStatus};

    #[test]
    fn page_sql_counts_outside_the_slice() {
        let sql = page_sql("SELECT doc, code FROM parents WHERE doc->>'status' = $1", "code", 2);
        let count_at = sql.find("COUNT(*) FROM matched").unwrap();
        let limit_at = sql.find("LIMIT $2 OFFSET $3").unwrap();
        assert!(count_at < limit_at);
        assert!(!sql[..limit_at].contains("OVER"));
    }

    #[test]
    fn enum_columns_use_wire_names() {
        assert_eq!(enum_str(&TeacherStatus::OnLeave).unwrap(), "on_leave");
        assert_eq!(enum_str(&Term::Second).unwrap(), "2");
    }
}
