//! Treasure - passcode-gated treasure hunt coordination backend
//!
//! This crate provides:
//! - A single session record (unlock code, admin code, target, release time)
//! - SQLite storage opened lazily on first use
//! - HTTP API for login, admin updates and status
//!
//! # Usage
//!
//! As a library (mounted by an external host):
//! ```ignore
//! use treasure::{Config, Core};
//!
//! let core = Core::new(Config::default());
//! let router = core.router();
//! ```
//!
//! As a standalone server (CLI):
//! ```text
//! treasure --config ~/.treasure/config.toml
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;

// Re-export main types for convenience
pub use config::Config;
pub use db::{Connector, Database};
pub use error::{CoreError, Result};

use handlers::{InitOutcome, SessionHandler};
use std::sync::Arc;

/// Core service that owns the configuration and the database connector
pub struct Core {
    /// Configuration
    pub config: Config,

    /// Lazily opened database
    connector: Arc<Connector>,
}

impl Core {
    /// Create a new Core instance. The database is not opened until first use.
    pub fn new(config: Config) -> Self {
        let connector = Arc::new(Connector::new(config.database.url.clone()));
        Core { config, connector }
    }

    fn app_state(&self) -> api::AppState {
        api::AppState::new(Arc::clone(&self.connector), self.config.game.clone())
    }

    /// Build the HTTP router without binding a port
    pub fn router(&self) -> axum::Router {
        api::create_router(self.app_state())
    }

    /// Start the HTTP API server (blocks until shutdown)
    pub async fn start_api_server(&self) -> Result<()> {
        let addr = self.config.server_addr();
        tracing::info!(
            "Starting API server on {} ({:?} mode)",
            addr,
            self.config.server.environment
        );
        api::serve(addr, self.app_state()).await
    }

    /// Create the session record if it does not exist yet
    pub async fn seed(&self) -> Result<InitOutcome> {
        let db = self.connector.get().await?;
        SessionHandler::new(db, Arc::new(self.config.game.clone()))
            .init()
            .await
    }

    /// Get the database connector
    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    /// Close the database connection
    pub async fn shutdown(&self) {
        self.connector.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.database.url = ":memory:".to_string();
        config
    }

    #[tokio::test]
    async fn test_core_is_lazy() {
        let core = Core::new(memory_config());
        assert!(!core.connector().is_connected().await);

        let _router = core.router();
        assert!(!core.connector().is_connected().await);
    }

    #[tokio::test]
    async fn test_seed_then_shutdown() {
        let core = Core::new(memory_config());
        assert_eq!(core.seed().await.unwrap(), InitOutcome::Created);
        assert_eq!(core.seed().await.unwrap(), InitOutcome::AlreadyExists);
        assert!(core.connector().is_connected().await);

        core.shutdown().await;
        assert!(!core.connector().is_connected().await);
    }
}
