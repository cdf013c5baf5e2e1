//! Core error types.

use thiserror::Error;

/// Core storage and definition errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Definition or version store error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Relational document store error.
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// JSON encoding or decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A settings block does not have the expected shape.
    #[error("malformed settings '{key}': {reason}")]
    MalformedSettings {
        /// Settings key holding the block.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Definition not found.
    #[error("definition not found: {0}")]
    NotFound(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Build a malformed-settings error.
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedSettings {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
