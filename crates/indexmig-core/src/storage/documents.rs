//! Serialized document table.
//!
//! Each row holds one serialized document (`Content`) tagged with the
//! fully-qualified type of the document (`Type`).

use super::config::DocumentStoreConfig;
use crate::error::Error;
use rusqlite::{params, Connection, OptionalExtension};

/// Name of the serialized payload column.
pub const CONTENT_COLUMN: &str = "Content";

/// Name of the type discriminator column.
pub const TYPE_COLUMN: &str = "Type";

/// Name of the row identifier column.
pub const ID_COLUMN: &str = "Id";

/// One stored document row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Row identifier.
    pub id: i64,
    /// Type discriminator.
    pub doc_type: String,
    /// Serialized payload.
    pub content: String,
}

/// Access to the document table of one store.
///
/// Statements here are SQLite-only; the rewrite path goes through the
/// configured dialect instead.
#[derive(Debug, Clone)]
pub struct DocumentTable {
    table: String,
}

impl DocumentTable {
    /// Document table described by `config`.
    pub fn new(config: &DocumentStoreConfig) -> Self {
        Self {
            table: config
                .dialect
                .dialect()
                .quote_for_table_name(&config.document_table_name(), config.schema.as_deref()),
        }
    }

    /// Create the table if it does not exist.
    pub fn create(&self, conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id} INTEGER PRIMARY KEY AUTOINCREMENT,
                {ty} TEXT NOT NULL,
                {content} TEXT NOT NULL
            );",
            table = self.table,
            id = ID_COLUMN,
            ty = TYPE_COLUMN,
            content = CONTENT_COLUMN,
        ))?;
        Ok(())
    }

    /// Insert a document and return its id.
    pub fn insert(&self, conn: &Connection, doc_type: &str, content: &str) -> Result<i64, Error> {
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                self.table, TYPE_COLUMN, CONTENT_COLUMN
            ),
            params![doc_type, content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a document by id.
    pub fn get(&self, conn: &Connection, id: i64) -> Result<Option<StoredDocument>, Error> {
        let document = conn
            .query_row(
                &format!(
                    "SELECT {}, {}, {} FROM {} WHERE {} = ?1",
                    ID_COLUMN, TYPE_COLUMN, CONTENT_COLUMN, self.table, ID_COLUMN
                ),
                params![id],
                |row| {
                    Ok(StoredDocument {
                        id: row.get(0)?,
                        doc_type: row.get(1)?,
                        content: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(document)
    }

    /// List every document, ordered by id.
    pub fn list(&self, conn: &Connection) -> Result<Vec<StoredDocument>, Error> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {}",
            ID_COLUMN, TYPE_COLUMN, CONTENT_COLUMN, self.table, ID_COLUMN
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredDocument {
                id: row.get(0)?,
                doc_type: row.get(1)?,
                content: row.get(2)?,
            })
        })?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }

    /// Count documents of a given type.
    pub fn count_by_type(&self, conn: &Connection, doc_type: &str) -> Result<u64, Error> {
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                self.table, TYPE_COLUMN
            ),
            params![doc_type],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
