//! Storage plumbing: sled configuration, record keys, and the relational
//! document store the deferred rewrite runs against.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod documents;
pub mod key;

pub use config::{DocumentStoreConfig, IsolationLevel, StorageConfig, DEFAULT_DOCUMENT_TABLE};
pub use connection::{ConnectionProvider, SqliteConnectionProvider};
pub use dialect::{
    DialectKind, MySqlDialect, PostgresDialect, SqlDialect, SqlServerDialect, SqliteDialect,
};
pub use documents::{DocumentTable, StoredDocument, CONTENT_COLUMN, ID_COLUMN, TYPE_COLUMN};
pub use key::{current_timestamp, RecordKey};
