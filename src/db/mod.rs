//! Database module for Treasure
//!
//! Provides SQLite storage for the treasure hunt session record.

pub mod connector;
pub mod schema;

use crate::config::expand_path;
use crate::error::{CoreError, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

pub use connector::Connector;

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Parse `sqlite://<path>`, `sqlite:<path>`, a bare path, or `:memory:`
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let rest = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        match rest {
            "" => Err(CoreError::Config("Database URL is empty".to_string())),
            ":memory:" => Ok(DatabaseLocation::Memory),
            path => Ok(DatabaseLocation::File(expand_path(&PathBuf::from(path)))),
        }
    }
}

/// SQLite database handle shared across requests
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: DatabaseLocation,
}

impl Database {
    /// Open the database a connection string points at
    pub fn open(url: &str) -> Result<Self> {
        match DatabaseLocation::parse(url)? {
            DatabaseLocation::Memory => Self::in_memory(),
            DatabaseLocation::File(path) => Self::new(path),
        }
    }

    /// Create a new database connection
    pub fn new(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        Self::init(conn, DatabaseLocation::File(db_path))
    }

    /// Create a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, DatabaseLocation::Memory)
    }

    fn init(conn: Connection, location: DatabaseLocation) -> Result<Self> {
        schema::init_db(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    /// Run a closure against the connection on the blocking thread pool
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&guard)
        })
        .await?;

        Ok(result?)
    }

    /// Where this database lives
    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }
}
