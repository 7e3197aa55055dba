//! Business logic handlers
//!
//! These handlers contain the game logic used by both the HTTP API and the
//! command line (`--seed`).

pub mod sessions;
pub mod types;

// Re-export commonly used types
pub use sessions::*;
pub use types::*;
