//! Relational store backing the bronze/silver/gold tiers.
//!
//! Uses rusqlite (SQLite) behind a cloneable `Database` handle. Every
//! storage operation checks the connection out through `with_conn` and
//! hands it back when the closure returns, so no lock is ever held across
//! an `.await`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

pub mod bronze_repo;
pub mod error;
pub mod gold_repo;
pub mod migrations;
pub mod silver_repo;

pub use error::DatabaseError;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). Writes are serialized through the
/// `Mutex`, which SQLite does anyway; WAL mode keeps readers unblocked.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Round-trips a trivial query to prove the store is reachable.
    pub fn ping(&self) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0))?;
            if one == 1 {
                Ok(())
            } else {
                Err(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
            }
        })
    }
}

/// Formats a timestamp the way every tier stores it.
///
/// Fixed precision and a `Z` suffix keep the TEXT columns ordered
/// lexicographically, which the retention and window queries rely on.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Returns the canonical database path: `~/.feedlake/data/feedlake.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".feedlake").join("data").join("feedlake.db"))
}
