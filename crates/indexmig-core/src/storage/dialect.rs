//! SQL dialects: identifier quoting and parameter placeholders per backend.
//!
//! Statements are only executed against SQLite (see
//! [`ConnectionProvider`](super::connection::ConnectionProvider)); the other
//! dialects build statement text for stores driven outside this crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-specific statement building.
pub trait SqlDialect: Send + Sync {
    /// Dialect name, for logs.
    fn name(&self) -> &'static str;

    /// Whether table names can be qualified by a schema.
    fn supports_schemas(&self) -> bool {
        true
    }

    /// Quote a table name, qualified by `schema` when given.
    fn quote_for_table_name(&self, table: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            _ => self.quote_identifier(table),
        }
    }

    /// Quote a column name.
    fn quote_for_column_name(&self, column: &str) -> String {
        self.quote_identifier(column)
    }

    /// Quote a single identifier.
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Placeholder for the 1-based parameter `index`.
    fn parameter(&self, index: usize) -> String;
}

fn quote_with(identifier: &str, open: char, close: char) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push(open);
    for c in identifier.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_schemas(&self) -> bool {
        false
    }

    // Attached databases are not supported.
    fn quote_for_table_name(&self, table: &str, _schema: Option<&str>) -> String {
        self.quote_identifier(table)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '"', '"')
    }

    fn parameter(&self, index: usize) -> String {
        format!("?{}", index)
    }
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '"', '"')
    }

    fn parameter(&self, index: usize) -> String {
        format!("${}", index)
    }
}

/// MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '`', '`')
    }

    fn parameter(&self, _index: usize) -> String {
        "?".to_string()
    }
}

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '[', ']')
    }

    fn parameter(&self, index: usize) -> String {
        format!("@p{}", index)
    }
}

/// Selects one of the built-in dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// SQLite.
    #[default]
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    MySql,
    /// Microsoft SQL Server.
    SqlServer,
}

impl DialectKind {
    /// The dialect implementation.
    pub fn dialect(self) -> &'static dyn SqlDialect {
        match self {
            DialectKind::Sqlite => &SqliteDialect,
            DialectKind::Postgres => &PostgresDialect,
            DialectKind::MySql => &MySqlDialect,
            DialectKind::SqlServer => &SqlServerDialect,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect().name())
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DialectKind::Sqlite),
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::MySql),
            "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            other => Err(format!("unknown sql dialect: {}", other)),
        }
    }
}
