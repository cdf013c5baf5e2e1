//! Subcommand implementations.

use crate::config::{CliConfig, Command, OutputFormat};
use crate::error::CliError;
use comfy_table::{Cell, Table};
use indexmig_core::catalog::{
    ContentTypeDefinition, DefinitionStore, PartDefinition, SledDefinitionStore,
};
use indexmig_core::migration::{
    ActivationReport, FeatureStatus, MigrationOrchestrator, SearchIndexMigration,
    SledVersionStore, VersionRecordStore,
};
use indexmig_core::storage::{ConnectionProvider, DocumentTable, SqliteConnectionProvider};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Stores of one tenant.
pub struct TenantSession {
    _db: sled::Db,
    definitions: Arc<SledDefinitionStore>,
    versions: Arc<SledVersionStore>,
    connections: Arc<SqliteConnectionProvider>,
}

impl TenantSession {
    /// Open (or create) the stores of `tenant`.
    pub fn open(config: &CliConfig, tenant: &str) -> Result<Self, CliError> {
        if tenant.is_empty() || tenant.starts_with('.') || tenant.contains(['/', '\\']) {
            return Err(CliError::Config(format!("invalid tenant name: {:?}", tenant)));
        }
        std::fs::create_dir_all(&config.data_path)?;

        let db = config.tenant_storage(tenant).open()?;
        let definitions = Arc::new(SledDefinitionStore::open(&db)?);
        let versions = Arc::new(SledVersionStore::open(&db)?);
        let connections = Arc::new(SqliteConnectionProvider::file(config.documents_path(tenant)));
        tracing::debug!(tenant, data_path = %config.data_path.display(), "tenant stores opened");

        Ok(Self {
            _db: db,
            definitions,
            versions,
            connections,
        })
    }

    fn orchestrator(&self, config: &CliConfig) -> MigrationOrchestrator {
        MigrationOrchestrator::new(
            self.definitions.clone(),
            self.versions.clone(),
            self.connections.clone(),
            config.migration.clone(),
        )
        .with_migration(SearchIndexMigration::default())
    }
}

/// Definitions file accepted by `import`.
#[derive(Debug, Default, Deserialize)]
pub struct DefinitionImport {
    /// Content type definitions.
    #[serde(default)]
    pub types: Vec<ContentTypeDefinition>,
    /// Standalone part definitions.
    #[serde(default)]
    pub parts: Vec<PartDefinition>,
}

/// Run `command` and return what to print.
pub fn execute(config: &CliConfig, command: Command) -> Result<String, CliError> {
    match command {
        Command::Migrate { tenant } => {
            let session = TenantSession::open(config, &tenant)?;
            let report = session.orchestrator(config).activate(&tenant)?;
            Ok(format_activation(&report, config.format))
        }
        Command::Status { tenant } => {
            let session = TenantSession::open(config, &tenant)?;
            let status = session.orchestrator(config).status(&tenant)?;
            Ok(format_status(&tenant, &status, config.format))
        }
        Command::MarkInstalled { tenant, feature } => {
            let session = TenantSession::open(config, &tenant)?;
            session.versions.mark_feature_installed(&tenant, &feature)?;
            session.versions.flush()?;
            tracing::info!(tenant = %tenant, feature = %feature, "feature marked installed");
            Ok(format!("{} marked installed for {}", feature, tenant))
        }
        Command::Import { tenant, file } => {
            let session = TenantSession::open(config, &tenant)?;
            import(config, &session, file.as_deref())
        }
        Command::Rules => Ok(serde_json::to_string_pretty(&config.migration.rules)?),
    }
}

fn import(
    config: &CliConfig,
    session: &TenantSession,
    file: Option<&Path>,
) -> Result<String, CliError> {
    let table = DocumentTable::new(&config.migration.documents);
    table.create(&session.connections.connect()?)?;

    let definitions: DefinitionImport = match file {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => DefinitionImport::default(),
    };
    for definition in &definitions.types {
        session.definitions.store_type_definition(definition)?;
    }
    for definition in &definitions.parts {
        session.definitions.store_part_definition(definition)?;
    }
    session.definitions.flush()?;

    tracing::info!(
        types = definitions.types.len(),
        parts = definitions.parts.len(),
        "definitions imported"
    );
    Ok(format!(
        "imported {} types and {} parts",
        definitions.types.len(),
        definitions.parts.len()
    ))
}

/// Render an activation report.
pub fn format_activation(report: &ActivationReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "tenant": report.tenant,
            "applied": report.applied.iter().map(|a| json!({
                "feature": a.feature,
                "from_version": a.from_version,
                "to_version": a.to_version,
            })).collect::<Vec<_>>(),
            "up_to_date": report.up_to_date,
            "deferred_tasks_run": report.deferred_tasks_run,
        })
        .to_string(),
        OutputFormat::Table => {
            if report.is_noop() {
                return format!("{}: nothing to migrate", report.tenant);
            }
            let mut table = Table::new();
            table.set_header(vec!["Feature", "From", "To"]);
            for applied in &report.applied {
                table.add_row(vec![
                    Cell::new(&applied.feature),
                    Cell::new(version_label(applied.from_version)),
                    Cell::new(applied.to_version),
                ]);
            }
            format!(
                "{}\n{} deferred task(s) run",
                table, report.deferred_tasks_run
            )
        }
    }
}

/// Render feature status.
pub fn format_status(tenant: &str, status: &[FeatureStatus], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "tenant": tenant,
            "features": status.iter().map(|s| json!({
                "feature": s.feature,
                "installed": s.installed,
                "latest": s.latest,
                "feature_installed": s.feature_installed,
                "current": s.is_current(),
            })).collect::<Vec<_>>(),
        })
        .to_string(),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["Feature", "Installed", "Latest", "State"]);
            for s in status {
                let state = match (s.is_current(), s.installed, s.feature_installed) {
                    (true, _, _) => "current",
                    (false, None, true) => "upgrade pending",
                    (false, None, false) => "not installed",
                    (false, Some(_), _) => "behind",
                };
                table.add_row(vec![
                    Cell::new(&s.feature),
                    Cell::new(version_label(s.installed)),
                    Cell::new(s.latest),
                    Cell::new(state),
                ]);
            }
            table.to_string()
        }
    }
}

fn version_label(version: Option<u64>) -> String {
    version.map_or_else(|| "-".to_string(), |v| v.to_string())
}
