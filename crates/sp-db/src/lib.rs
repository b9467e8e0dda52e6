//! Storage layer for the study planner.
//!
//! Persists recorded study sessions (the effort model's training data) and
//! saved timetables using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Use one `Database` per thread, or a `Mutex<Database>`.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC (e.g. `2025-01-15T10:30:00Z`),
//! so lexicographic order matches chronological order. Saved timetables keep
//! their day map as a JSON document in the `data` column.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sp_core::{SessionObservation, Timetable};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A timetable could not be encoded for storage.
    #[error("failed to encode timetable: {0}")]
    Encode(#[source] serde_json::Error),
    /// A stored timetable is not valid JSON.
    #[error("invalid timetable data for {id}: {source}")]
    InvalidTimetable {
        id: i64,
        #[source]
        source: serde_json::Error,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Listing entry for a saved timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableSummary {
    pub id: i64,
    pub created_at: String,
    pub title: Option<String>,
    pub variant: Option<String>,
}

/// A saved timetable with its day map.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTimetable {
    pub summary: TimetableSummary,
    pub timetable: Timetable,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- One row per study session; training data for the effort model
            CREATE TABLE IF NOT EXISTS session_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                actual_hours REAL NOT NULL,
                difficulty INTEGER,
                importance INTEGER,
                syllabus_size REAL,
                days_to_deadline INTEGER,
                task_type TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_session_history_subject ON session_history(subject);

            -- data: JSON object of ISO date -> [{subject, hours}]
            CREATE TABLE IF NOT EXISTS timetables (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                variant TEXT,
                title TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_timetables_created ON timetables(created_at);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of session observations in one transaction.
    pub fn insert_sessions(&mut self, sessions: &[SessionObservation]) -> Result<usize, DbError> {
        if sessions.is_empty() {
            return Ok(0);
        }
        let created_at = now_timestamp();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO session_history
                (subject, actual_hours, difficulty, importance, syllabus_size, days_to_deadline, task_type, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for session in sessions {
                inserted += stmt.execute(params![
                    session.subject,
                    session.actual_hours,
                    session.difficulty,
                    session.importance,
                    session.syllabus_size,
                    session.days_to_deadline,
                    session.task_type,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, "recorded study sessions");
        Ok(inserted)
    }

    /// Lists all recorded sessions in insertion order.
    ///
    /// Missing attributes come back as the planner defaults.
    pub fn list_sessions(&self) -> Result<Vec<SessionObservation>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT subject, actual_hours, difficulty, importance, syllabus_size, days_to_deadline, task_type
            FROM session_history
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionObservation {
                subject: row.get(0)?,
                actual_hours: row.get(1)?,
                difficulty: row.get::<_, Option<i64>>(2)?.unwrap_or(3),
                importance: row.get::<_, Option<i64>>(3)?.unwrap_or(3),
                syllabus_size: row.get::<_, Option<f64>>(4)?.unwrap_or(1.0),
                days_to_deadline: row.get(5)?,
                task_type: row
                    .get::<_, Option<String>>(6)?
                    .unwrap_or_else(|| "Other".to_string()),
            })
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Saves a timetable and returns its ID.
    pub fn save_timetable(
        &mut self,
        title: Option<&str>,
        variant: Option<i64>,
        timetable: &Timetable,
    ) -> Result<i64, DbError> {
        let data = serde_json::to_string(timetable).map_err(DbError::Encode)?;
        self.conn.execute(
            "INSERT INTO timetables (created_at, variant, title, data) VALUES (?, ?, ?, ?)",
            params![
                now_timestamp(),
                variant.map(|v| v.to_string()),
                title,
                data
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Lists saved timetables, newest first.
    pub fn list_timetables(&self) -> Result<Vec<TimetableSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, created_at, title, variant
            FROM timetables
            ORDER BY created_at DESC, id DESC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TimetableSummary {
                id: row.get(0)?,
                created_at: row.get(1)?,
                title: row.get(2)?,
                variant: row.get(3)?,
            })
        })?;
        let mut timetables = Vec::new();
        for row in rows {
            timetables.push(row?);
        }
        Ok(timetables)
    }

    /// Loads a saved timetable by ID.
    pub fn load_timetable(&self, id: i64) -> Result<Option<SavedTimetable>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, created_at, title, variant, data FROM timetables WHERE id = ?",
                [id],
                |row| {
                    let summary = TimetableSummary {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        title: row.get(2)?,
                        variant: row.get(3)?,
                    };
                    let data: String = row.get(4)?;
                    Ok((summary, data))
                },
            )
            .optional()?;

        let Some((summary, data)) = row else {
            return Ok(None);
        };
        let timetable = serde_json::from_str(&data)
            .map_err(|source| DbError::InvalidTimetable { id, source })?;
        Ok(Some(SavedTimetable { summary, timetable }))
    }

    /// Deletes a saved timetable. Returns whether it existed.
    pub fn delete_timetable(&mut self, id: i64) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM timetables WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
