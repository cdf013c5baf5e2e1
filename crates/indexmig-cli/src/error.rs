//! CLI error types.

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] indexmig_core::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(#[from] indexmig_core::MigrationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
