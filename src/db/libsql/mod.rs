//! libSQL/Turso backend.
//!
//! Runs on an embedded local file by default, or as an embedded replica of
//! a remote Turso database. A fresh connection is opened per operation;
//! write transactions start `IMMEDIATE` so concurrent writers queue on the
//! busy timeout instead of failing on lock upgrade.

mod garden;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Connection, Database};

use crate::db::libsql_migrations::{SCHEMA, SCHEMA_VERSION};
use crate::error::DatabaseError;

/// How long a connection waits on a locked database.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// libSQL database backend.
#[derive(Clone)]
pub struct LibSqlBackend {
    db: Arc<Database>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Query(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = libsql::Builder::new_local(path).build().await?;
        tracing::info!(path = %path.display(), "opened local libSQL database");
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an embedded replica of a remote database and sync it once.
    pub async fn new_remote_replica(
        path: &Path,
        url: &str,
        auth_token: &str,
    ) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote_replica(path, url.to_string(), auth_token.to_string())
            .build()
            .await?;
        db.sync().await?;
        tracing::info!(path = %path.display(), url, "opened libSQL remote replica");
        Ok(Self { db: Arc::new(db) })
    }

    /// Open a connection with the busy timeout applied.
    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self.db.connect()?;
        // PRAGMA busy_timeout returns a row, so it goes through `query`.
        conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), ())
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to set busy_timeout: {e}")))?;
        Ok(conn)
    }

    pub(crate) async fn apply_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        conn.execute(
            "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![SCHEMA_VERSION, "garden"],
        )
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::debug!(version = SCHEMA_VERSION, "libSQL schema applied");
        Ok(())
    }
}

// ==================== Row helpers ====================

pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Serialization(format!("column {idx}: {e}")))
}

pub(crate) fn get_opt_text(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    row.get::<Option<String>>(idx)
        .map_err(|e| DatabaseError::Serialization(format!("column {idx}: {e}")))
}

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx)
        .map_err(|e| DatabaseError::Serialization(format!("column {idx}: {e}")))
}

/// Parse a column value through `FromStr`.
pub(crate) fn get_parsed<T>(row: &libsql::Row, idx: i32) -> Result<T, DatabaseError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let text = get_text(row, idx)?;
    text.parse()
        .map_err(|e| DatabaseError::Serialization(format!("column {idx} ('{text}'): {e}")))
}

pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse RFC 3339, falling back to SQLite's `datetime('now')` format.
pub(crate) fn parse_ts(text: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Serialization(format!("invalid timestamp '{text}': {e}")))
}

/// Map a write failure, surfacing uniqueness violations as constraints.
pub(crate) fn map_write_err(e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") || message.contains("PRIMARY KEY") {
        DatabaseError::Constraint(message)
    } else {
        DatabaseError::Query(message)
    }
}
