//! Relational connection provider.

use crate::error::Error;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::time::Duration;

/// Default time to wait on a locked database.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands out fresh connections to the document store.
///
/// Connections are SQLite connections, so SQLite is the only backend rewrites
/// execute against. Other [`DialectKind`](super::DialectKind)s only shape
/// statement text.
pub trait ConnectionProvider: Send + Sync {
    /// Open a new connection.
    fn connect(&self) -> Result<Connection, Error>;
}

/// Where a SQLite database lives.
#[derive(Debug, Clone)]
enum SqliteTarget {
    File(PathBuf),
    SharedMemory(String),
}

/// Connection provider for SQLite databases.
#[derive(Debug, Clone)]
pub struct SqliteConnectionProvider {
    target: SqliteTarget,
    busy_timeout: Duration,
}

impl SqliteConnectionProvider {
    /// Connect to a database file, creating it if needed.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: SqliteTarget::File(path.into()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Connect to a named in-memory database shared by all connections of
    /// this process. The database is dropped when its last connection closes.
    pub fn shared_memory(name: impl Into<String>) -> Self {
        Self {
            target: SqliteTarget::SharedMemory(name.into()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Set how long to wait on a locked database.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    fn connect(&self) -> Result<Connection, Error> {
        let conn = match &self.target {
            SqliteTarget::File(path) => Connection::open(path)?,
            SqliteTarget::SharedMemory(name) => Connection::open_with_flags(
                format!("file:{}?mode=memory&cache=shared", name),
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}
