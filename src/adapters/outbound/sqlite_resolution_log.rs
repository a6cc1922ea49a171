//! SQLite Resolution Log
//!
//! Implements ResolutionLogSink as an insert-only SQLite table.
//! Each appended batch is written in a single transaction; a row SQLite
//! refuses is skipped without rolling back the rest of the batch.
//! Non-finite coordinates are stored as NULL and read back as NaN.

use crate::domain::entities::ResolutionLogEntry;
use crate::domain::error::LogSinkError;
use crate::domain::ports::ResolutionLogSink;
use crate::domain::value_objects::ResolutionStatus;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS resolution_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at_ms INTEGER NOT NULL,
    lat REAL,
    lon REAL,
    status TEXT NOT NULL,
    governorate TEXT,
    district TEXT,
    block TEXT,
    police_zone TEXT,
    duration_us INTEGER NOT NULL,
    snapshot_version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resolution_log_status ON resolution_log (status);";

/// SQLite-backed append-only audit log.
///
/// The connection is shared behind a mutex; writes run on the blocking
/// thread pool so the async writer task never stalls the runtime.
pub struct SqliteResolutionLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteResolutionLog {
    /// Open (or create) the log database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory log, mostly for tests.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert entries in order inside one transaction.
    ///
    /// Returns the number of rows refused and the first refusal.
    fn insert_batch(
        conn: &mut Connection,
        entries: &[ResolutionLogEntry],
    ) -> rusqlite::Result<(usize, Option<rusqlite::Error>)> {
        let tx = conn.transaction()?;
        let mut rejected = 0;
        let mut first_error = None;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO resolution_log (
                    recorded_at_ms, lat, lon, status, governorate, district, block,
                    police_zone, duration_us, snapshot_version
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for entry in entries {
                // A failed statement is backed out on its own; the
                // transaction stays open for the remaining rows.
                let inserted = stmt.execute(params![
                    entry.recorded_at_ms as i64,
                    finite(entry.lat),
                    finite(entry.lon),
                    entry.status.as_str(),
                    entry.governorate,
                    entry.district,
                    entry.block,
                    entry.police_zone,
                    entry.duration_us as i64,
                    entry.snapshot_version as i64,
                ]);
                if let Err(e) = inserted {
                    rejected += 1;
                    first_error.get_or_insert(e);
                }
            }
        }
        tx.commit()?;
        Ok((rejected, first_error))
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ResolutionLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT recorded_at_ms, lat, lon, status, governorate, district, block,
                    police_zone, duration_us, snapshot_version
             FROM resolution_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map([limit as i64], |row| Self::row_to_entry(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Number of entries, optionally restricted to one status.
    pub fn count(&self, status: Option<ResolutionStatus>) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM resolution_log WHERE status = ?1",
                [status.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM resolution_log", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    /// Convert a SQLite row to a log entry.
    fn row_to_entry(row: &Row) -> rusqlite::Result<ResolutionLogEntry> {
        let status: String = row.get(3)?;
        let status = ResolutionStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown status {}", status).into(),
            )
        })?;

        Ok(ResolutionLogEntry {
            recorded_at_ms: row.get::<_, i64>(0)? as u64,
            lat: row.get::<_, Option<f64>>(1)?.unwrap_or(f64::NAN),
            lon: row.get::<_, Option<f64>>(2)?.unwrap_or(f64::NAN),
            status,
            governorate: row.get(4)?,
            district: row.get(5)?,
            block: row.get(6)?,
            police_zone: row.get(7)?,
            duration_us: row.get::<_, i64>(8)? as u64,
            snapshot_version: row.get::<_, i64>(9)? as u64,
        })
    }
}

#[async_trait]
impl ResolutionLogSink for SqliteResolutionLog {
    async fn append(&self, entries: &[ResolutionLogEntry]) -> Result<(), LogSinkError> {
        if entries.is_empty() {
            return Ok(());
        }

        let conn = self.conn.clone();
        let batch = entries.to_vec();
        let (rejected, first_error) = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            Self::insert_batch(&mut guard, &batch)
        })
        .await
        .map_err(|e| LogSinkError::Unavailable(format!("spawn_blocking error: {}", e)))?
        .map_err(|e| LogSinkError::Unavailable(e.to_string()))?;

        match first_error {
            None => Ok(()),
            Some(e) => Err(LogSinkError::Rejected {
                rejected,
                total: entries.len(),
                reason: e.to_string(),
            }),
        }
    }
}

/// SQLite has no NaN; non-finite coordinates become NULL.
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
