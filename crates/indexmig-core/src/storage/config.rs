//! Storage configuration.

use super::dialect::DialectKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default name of the serialized document table.
pub const DEFAULT_DOCUMENT_TABLE: &str = "Document";

/// Configuration for the sled database holding definitions and version records.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./indexmig_data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(500),
            compression: true,
            temporary: false,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Open the sled database described by this configuration.
    pub fn open(&self) -> Result<sled::Db, crate::error::Error> {
        Ok(self.to_sled_config().open()?)
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}

/// Transaction isolation requested for the document rewrite.
///
/// SQLite is always serializable; the level decides how early the write lock
/// is taken (see [`IsolationLevel::transaction_behavior`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Read uncommitted.
    ReadUncommitted,
    /// Read committed.
    #[default]
    ReadCommitted,
    /// Repeatable read.
    RepeatableRead,
    /// Serializable.
    Serializable,
}

impl IsolationLevel {
    /// SQLite transaction behavior used for this level.
    pub fn transaction_behavior(self) -> rusqlite::TransactionBehavior {
        match self {
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => {
                rusqlite::TransactionBehavior::Deferred
            }
            IsolationLevel::RepeatableRead => rusqlite::TransactionBehavior::Immediate,
            IsolationLevel::Serializable => rusqlite::TransactionBehavior::Exclusive,
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationLevel::ReadUncommitted => write!(f, "read_uncommitted"),
            IsolationLevel::ReadCommitted => write!(f, "read_committed"),
            IsolationLevel::RepeatableRead => write!(f, "repeatable_read"),
            IsolationLevel::Serializable => write!(f, "serializable"),
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "read_uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(format!("unknown isolation level: {}", other)),
        }
    }
}

/// Layout of the relational document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStoreConfig {
    /// Prefix prepended to every table name.
    pub table_prefix: String,
    /// Database schema, if the backend uses one.
    pub schema: Option<String>,
    /// Document table name, before the prefix.
    pub document_table: String,
    /// Isolation level for rewrite transactions.
    pub isolation_level: IsolationLevel,
    /// SQL dialect of the backend.
    pub dialect: DialectKind,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            schema: None,
            document_table: DEFAULT_DOCUMENT_TABLE.to_string(),
            isolation_level: IsolationLevel::default(),
            dialect: DialectKind::Sqlite,
        }
    }
}

impl DocumentStoreConfig {
    /// Set the table prefix.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the document table name.
    pub fn with_document_table(mut self, table: impl Into<String>) -> Self {
        self.document_table = table.into();
        self
    }

    /// Set the isolation level.
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// The configured schema when the dialect cannot use it.
    pub fn ignored_schema(&self) -> Option<&str> {
        self.schema
            .as_deref()
            .filter(|schema| !schema.is_empty() && !self.dialect.dialect().supports_schemas())
    }

    /// Full document table name including the prefix.
    pub fn document_table_name(&self) -> String {
        format!("{}{}", self.table_prefix, self.document_table)
    }
}
