//! CLI configuration.

use crate::error::CliError;
use clap::{Parser, Subcommand, ValueEnum};
use indexmig_core::migration::{MigrationConfig, RewriteRule, SEARCH_FEATURE_ID};
use indexmig_core::settings::SettingsKeys;
use indexmig_core::storage::{
    DocumentStoreConfig, IsolationLevel, StorageConfig, DEFAULT_DOCUMENT_TABLE,
};
use std::path::{Path, PathBuf};

/// Default directory holding tenant data.
pub const DEFAULT_DATA_PATH: &str = "./indexmig_data";

/// Default sled page cache per tenant, in megabytes.
pub const DEFAULT_CACHE_MB: u64 = 64;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table.
    #[default]
    Table,
    /// JSON.
    Json,
}

/// Resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory holding one sled database per tenant.
    pub data_path: PathBuf,
    /// Document database override. Defaults to `<data-path>/<tenant>.sqlite`.
    pub documents_path: Option<PathBuf>,
    /// Sled page cache in bytes.
    pub cache_capacity: u64,
    /// Migration configuration.
    pub migration: MigrationConfig,
    /// Report format.
    pub format: OutputFormat,
}

impl CliConfig {
    /// Create a configuration rooted at `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            documents_path: None,
            cache_capacity: DEFAULT_CACHE_MB * 1024 * 1024,
            migration: MigrationConfig::default(),
            format: OutputFormat::default(),
        }
    }

    /// Set the document database path.
    pub fn with_documents_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.documents_path = Some(path.into());
        self
    }

    /// Set the migration configuration.
    pub fn with_migration(mut self, migration: MigrationConfig) -> Self {
        self.migration = migration;
        self
    }

    /// Sled configuration for `tenant`.
    pub fn tenant_storage(&self, tenant: &str) -> StorageConfig {
        StorageConfig {
            cache_capacity: self.cache_capacity,
            ..StorageConfig::new(self.data_path.join(tenant))
        }
    }

    /// Document database of `tenant`.
    pub fn documents_path(&self, tenant: &str) -> PathBuf {
        self.documents_path
            .clone()
            .unwrap_or_else(|| self.data_path.join(format!("{}.sqlite", tenant)))
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "indexmig")]
#[command(version, about = "Content-index settings migration runner", long_about = None)]
pub struct Args {
    /// Directory holding tenant definition databases.
    #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// SQLite document database (defaults to <data-path>/<tenant>.sqlite).
    #[arg(long)]
    pub documents: Option<PathBuf>,

    /// Prefix of the tenant's tables.
    #[arg(long, default_value = "")]
    pub table_prefix: String,

    /// Database schema of the document table. SQLite has none and ignores it.
    #[arg(long)]
    pub schema: Option<String>,

    /// Document table name, before the prefix.
    #[arg(long, default_value = DEFAULT_DOCUMENT_TABLE)]
    pub document_table: String,

    /// Isolation level of the rewrite transaction.
    #[arg(long, default_value_t = IsolationLevel::ReadCommitted)]
    pub isolation: IsolationLevel,

    /// JSON file with the rewrite rules to apply instead of the built-in ones.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Settings key of the legacy block.
    #[arg(long)]
    pub legacy_key: Option<String>,

    /// Settings key of the unified block.
    #[arg(long)]
    pub unified_key: Option<String>,

    /// Sled page cache in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    pub cache_mb: u64,

    /// Report format.
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bring a tenant's features to their latest version.
    Migrate {
        /// Tenant name.
        #[arg(short, long)]
        tenant: String,
    },
    /// Show installed vs latest version per feature.
    Status {
        /// Tenant name.
        #[arg(short, long)]
        tenant: String,
    },
    /// Record a feature as installed before version tracking existed.
    MarkInstalled {
        /// Tenant name.
        #[arg(short, long)]
        tenant: String,
        /// Feature identifier.
        #[arg(short, long, default_value = SEARCH_FEATURE_ID)]
        feature: String,
    },
    /// Create the document table and import definitions from a JSON file.
    Import {
        /// Tenant name.
        #[arg(short, long)]
        tenant: String,
        /// File with `types` and `parts` arrays.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print the rewrite rules in effect as JSON.
    Rules,
}

impl Args {
    /// Convert command-line arguments to CLI configuration.
    pub fn into_config(self) -> Result<(CliConfig, Command), CliError> {
        let mut documents = DocumentStoreConfig::default()
            .with_table_prefix(self.table_prefix)
            .with_document_table(self.document_table)
            .with_isolation_level(self.isolation);
        if let Some(schema) = self.schema {
            documents = documents.with_schema(schema);
        }
        if let Some(schema) = documents.ignored_schema() {
            tracing::warn!(
                schema,
                dialect = %documents.dialect,
                "--schema has no effect on this document store"
            );
        }

        let defaults = SettingsKeys::default();
        let keys = SettingsKeys {
            legacy: self.legacy_key.unwrap_or(defaults.legacy),
            unified: self.unified_key.unwrap_or(defaults.unified),
        };
        if keys.legacy == keys.unified {
            return Err(CliError::Config(
                "legacy and unified settings keys must differ".to_string(),
            ));
        }

        let mut migration = MigrationConfig::default()
            .with_documents(documents)
            .with_keys(keys);
        if let Some(path) = &self.rules {
            migration = migration.with_rules(load_rules(path)?);
        }

        let mut config = CliConfig::new(self.data_path).with_migration(migration);
        config.cache_capacity = self.cache_mb * 1024 * 1024;
        config.format = self.format;
        if let Some(path) = self.documents {
            config = config.with_documents_path(path);
        }
        Ok((config, self.command))
    }
}

/// Load rewrite rules from a JSON array.
pub fn load_rules(path: &Path) -> Result<Vec<RewriteRule>, CliError> {
    let text = std::fs::read_to_string(path)?;
    let rules: Vec<RewriteRule> = serde_json::from_str(&text)?;
    tracing::debug!(path = %path.display(), rules = rules.len(), "rewrite rules loaded");
    Ok(rules)
}
