//! Lazily established, process-wide database handle
//!
//! The first caller opens the database; later callers reuse it. A failed open
//! leaves the slot empty so the next request tries again.

use super::Database;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct Connector {
    url: String,
    slot: RwLock<Option<Arc<Database>>>,
}

impl Connector {
    /// Create a connector. Nothing is opened until [`Connector::get`].
    pub fn new(url: impl Into<String>) -> Self {
        Connector {
            url: url.into(),
            slot: RwLock::new(None),
        }
    }

    /// Return the shared database, opening it if needed
    pub async fn get(&self) -> Result<Arc<Database>> {
        if let Some(db) = self.slot.read().await.as_ref() {
            return Ok(Arc::clone(db));
        }

        let mut slot = self.slot.write().await;
        // Another caller may have connected while we waited for the lock
        if let Some(db) = slot.as_ref() {
            return Ok(Arc::clone(db));
        }

        let url = self.url.clone();
        let opened = match tokio::task::spawn_blocking(move || Database::open(&url)).await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };

        match opened {
            Ok(db) => {
                tracing::info!("Connected to database ({:?})", db.location());
                let db = Arc::new(db);
                *slot = Some(Arc::clone(&db));
                Ok(db)
            }
            Err(e) => {
                tracing::error!("Failed to connect to database: {}", e);
                *slot = None;
                Err(e)
            }
        }
    }

    /// Drop the cached handle. Returns true if one was open.
    pub async fn close(&self) -> bool {
        let closed = self.slot.write().await.take().is_some();
        if closed {
            tracing::info!("Database connection closed");
        }
        closed
    }

    /// Whether a handle is currently cached
    pub async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connects_lazily_and_reuses() {
        let connector = Connector::new(":memory:");
        assert!(!connector.is_connected().await);

        let first = connector.get().await.unwrap();
        let second = connector.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(connector.is_connected().await);
    }

    #[tokio::test]
    async fn test_failure_clears_slot_and_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let db_path = blocker.join("treasure.db");

        let connector = Connector::new(format!("sqlite://{}", db_path.display()));
        assert!(connector.get().await.is_err());
        assert!(!connector.is_connected().await);

        // Clear the obstacle; the next call retries and succeeds
        std::fs::remove_file(&blocker).unwrap();
        assert!(connector.get().await.is_ok());
        assert!(connector.is_connected().await);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_close_tears_down() {
        let connector = Connector::new(":memory:");
        assert!(!connector.close().await);

        let first = connector.get().await.unwrap();
        assert!(connector.close().await);
        assert!(!connector.is_connected().await);

        let second = connector.get().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_handle() {
        let connector = Arc::new(Connector::new(":memory:"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let connector = Arc::clone(&connector);
                tokio::spawn(async move { connector.get().await.unwrap() })
            })
            .collect();

        let mut dbs = Vec::new();
        for handle in handles {
            dbs.push(handle.await.unwrap());
        }
        assert!(dbs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
