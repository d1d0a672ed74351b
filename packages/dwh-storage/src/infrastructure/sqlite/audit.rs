//! SQLite audit log
//!
//! Append-only table `maintenance_audit_log` in the main database. Timestamps
//! are stored as unix milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::domain::{AuditEntry, AuditRecord, AuditSink};
use crate::error::StorageError;
use crate::Result;

const CREATE_AUDIT_TABLE: &str = "
CREATE TABLE IF NOT EXISTS main.maintenance_audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    logged_at INTEGER NOT NULL,
    environment TEXT NOT NULL,
    operation TEXT NOT NULL,
    target_layer TEXT NOT NULL,
    acting_identity TEXT NOT NULL,
    outcome TEXT NOT NULL,
    detail TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS main.idx_audit_logged_at ON maintenance_audit_log(logged_at);
";

/// SQLite-backed [`AuditSink`]
#[derive(Clone)]
pub struct SqliteAuditLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditLog {
    /// Open a standalone audit database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_shared(Arc::new(Mutex::new(Connection::open(path)?)))
    }

    /// In-memory audit log (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_shared(Arc::new(Mutex::new(Connection::open_in_memory()?)))
    }

    pub(crate) fn from_shared(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::database("SQLite connection mutex poisoned"))?;
            guard.execute_batch(CREATE_AUDIT_TABLE)?;
        }
        Ok(Self { conn })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::database("SQLite connection mutex poisoned"))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::database(format!("blocking task failed: {}", e)))?
    }
}

fn millis_to_datetime(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Integer,
            format!("invalid audit timestamp {}", millis).into(),
        )
    })
}

fn parse_column<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        id: row.get(0)?,
        entry: AuditEntry {
            timestamp: millis_to_datetime(row.get(1)?)?,
            environment: parse_column(row, 2)?,
            operation: parse_column(row, 3)?,
            target_layer: parse_column(row, 4)?,
            acting_identity: row.get(5)?,
            outcome: parse_column(row, 6)?,
            detail: row.get(7)?,
        },
    })
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<i64> {
        let entry = entry.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO main.maintenance_audit_log
                    (logged_at, environment, operation, target_layer, acting_identity, outcome, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.timestamp.timestamp_millis(),
                    entry.environment.as_str(),
                    entry.operation.as_str(),
                    entry.target_layer.as_str(),
                    entry.acting_identity,
                    entry.outcome.as_str(),
                    entry.detail,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, logged_at, environment, operation, target_layer,
                        acting_identity, outcome, detail
                 FROM main.maintenance_audit_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;
            let records = stmt
                .query_map(params![limit as i64], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}
