//! SQLite-backed durable store.
//!
//! Every uniqueness key in the catalog is a `UNIQUE` constraint, and every
//! get-or-create goes through `INSERT ... ON CONFLICT DO NOTHING` followed by a
//! select on the same key inside one transaction, so concurrent writers never
//! produce duplicates. Job leases are the only rows claimed under an explicit
//! write lock (`BEGIN IMMEDIATE`).

mod catalog;
mod dispatch;
mod helpers;
mod items;
mod job_lock;
mod search;

pub use search::CreatedSearch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;

/// Default time SQLite waits on a locked database before reporting busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RepositoryError {
    /// True for transient lock contention (`SQLITE_BUSY` / `SQLITE_LOCKED`).
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Handle to the catalog database. Cheap to clone; opens a connection per call.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl Store {
    /// Open (creating if needed) the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
            busy_timeout,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        "#,
        )?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS keywords (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS search_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword_id INTEGER NOT NULL REFERENCES keywords(id),
                search_type TEXT NOT NULL,
                page_count INTEGER NOT NULL CHECK (page_count > 0),
                is_active INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'pending',
                processed INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS authors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fullname TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL REFERENCES authors(id),
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                thumbnail TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                UNIQUE(author_id, title)
            );

            CREATE TABLE IF NOT EXISTS book_genres (
                book_id INTEGER NOT NULL REFERENCES books(id),
                genre_id INTEGER NOT NULL REFERENCES genres(id),
                PRIMARY KEY (book_id, genre_id)
            );

            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE,
                thumbnail TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            -- Items found on search result pages
            CREATE TABLE IF NOT EXISTS book_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_request_id INTEGER NOT NULL REFERENCES search_requests(id),
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                is_scraped INTEGER NOT NULL DEFAULT 0,
                book_id INTEGER REFERENCES books(id),
                discovered_at TEXT NOT NULL,
                scraped_at TEXT,
                UNIQUE(search_request_id, title)
            );

            CREATE TABLE IF NOT EXISTS group_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_request_id INTEGER NOT NULL REFERENCES search_requests(id),
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                is_scraped INTEGER NOT NULL DEFAULT 0,
                group_id INTEGER REFERENCES groups(id),
                discovered_at TEXT NOT NULL,
                scraped_at TEXT,
                UNIQUE(search_request_id, title)
            );

            -- One lease row per job name
            CREATE TABLE IF NOT EXISTS job_locks (
                job_name TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'idle',
                holder TEXT,
                updated_at TEXT NOT NULL
            );

            -- Outbox of job requests created by submissions
            CREATE TABLE IF NOT EXISTS job_dispatches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name TEXT NOT NULL,
                search_request_id INTEGER NOT NULL REFERENCES search_requests(id),
                keyword TEXT NOT NULL,
                search_type TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                consumed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_search_requests_signature
                ON search_requests(keyword_id, search_type, page_count);
            CREATE INDEX IF NOT EXISTS idx_search_requests_pending
                ON search_requests(is_active, processed);
            CREATE INDEX IF NOT EXISTS idx_book_items_unscraped
                ON book_items(is_scraped);
            CREATE INDEX IF NOT EXISTS idx_group_items_unscraped
                ON group_items(is_scraped);
            CREATE INDEX IF NOT EXISTS idx_job_dispatches_pending
                ON job_dispatches(consumed_at);
        "#,
        )?;
        Ok(())
    }
}

/// Convert a single-row query result into an Option.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Timestamp text as written to every `*_at` column.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;

    #[test]
    fn test_open_is_idempotent() {
        let (store, _dir) = temp_store();
        // Re-opening runs CREATE IF NOT EXISTS again without error
        let reopened = Store::open(store.path()).unwrap();
        assert_eq!(reopened.path(), store.path());
    }

    #[test]
    fn test_is_busy() {
        let busy = RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        ));
        assert!(busy.is_busy());

        let locked = RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        ));
        assert!(locked.is_busy());

        let other = RepositoryError::NotFound("search request 1".to_string());
        assert!(!other.is_busy());
        let constraint = RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        ));
        assert!(!constraint.is_busy());
    }

    #[test]
    fn test_parse_datetime_fallback() {
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
        assert!(parse_datetime_opt(Some("garbage".to_string())).is_none());
        assert!(parse_datetime_opt(None).is_none());
    }
}
