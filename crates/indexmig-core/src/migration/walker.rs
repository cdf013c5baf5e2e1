//! Definition walker: applies the settings migrator across every stored
//! content definition.

use super::error::MigrationError;
use crate::catalog::DefinitionStore;
use crate::settings::SettingsMigrator;

/// Counts gathered while walking the definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Content types visited.
    pub types_visited: usize,
    /// Part references (type-level parts) visited.
    pub type_parts_visited: usize,
    /// Standalone parts visited.
    pub parts_visited: usize,
    /// Fields visited.
    pub fields_visited: usize,
    /// Settings blocks rewritten.
    pub settings_migrated: usize,
    /// Definitions persisted because something changed.
    pub definitions_altered: usize,
}

/// Walks content definitions and migrates their index settings.
///
/// Every alter touches a single definition. A failure part-way leaves earlier
/// definitions migrated; walking again skips them.
pub struct DefinitionWalker<'a> {
    store: &'a dyn DefinitionStore,
    migrator: &'a SettingsMigrator,
}

impl<'a> DefinitionWalker<'a> {
    /// Create a walker over `store`.
    pub fn new(store: &'a dyn DefinitionStore, migrator: &'a SettingsMigrator) -> Self {
        Self { store, migrator }
    }

    /// Migrate type-level part settings, then part and field settings.
    pub fn upgrade_definitions(&self) -> Result<WalkReport, MigrationError> {
        let mut report = WalkReport::default();
        self.upgrade_type_parts(&mut report)?;
        self.upgrade_parts(&mut report)?;

        tracing::info!(
            types = report.types_visited,
            parts = report.parts_visited,
            fields = report.fields_visited,
            migrated = report.settings_migrated,
            "content definitions upgraded"
        );
        Ok(report)
    }

    fn upgrade_type_parts(&self, report: &mut WalkReport) -> Result<(), MigrationError> {
        let types = self
            .store
            .load_type_definitions()
            .map_err(MigrationError::SchemaRead)?;

        for type_definition in &types {
            report.types_visited += 1;

            for part in &type_definition.parts {
                report.type_parts_visited += 1;
                if !self.migrator.needs_migration(&part.settings) {
                    continue;
                }

                let mut migrated = 0;
                let altered = self
                    .store
                    .alter_type_part_definition(&type_definition.name, &part.name, &mut |part| {
                        migrated = 0;
                        if self.migrator.migrate_in_place(&mut part.settings)? {
                            migrated += 1;
                        }
                        Ok(migrated > 0)
                    })
                    .map_err(MigrationError::SchemaRead)?;

                if altered {
                    tracing::debug!(
                        content_type = %type_definition.name,
                        part = %part.name,
                        "type part settings migrated"
                    );
                    report.settings_migrated += migrated;
                    report.definitions_altered += 1;
                }
            }
        }
        Ok(())
    }

    fn upgrade_parts(&self, report: &mut WalkReport) -> Result<(), MigrationError> {
        let parts = self
            .store
            .load_part_definitions()
            .map_err(MigrationError::SchemaRead)?;

        for part_definition in &parts {
            report.parts_visited += 1;
            report.fields_visited += part_definition.fields.len();

            let mut migrated = 0;
            let altered = self
                .store
                .alter_part_definition(&part_definition.name, &mut |part| {
                    migrated = 0;
                    if self.migrator.migrate_in_place(&mut part.settings)? {
                        migrated += 1;
                    }
                    for field in &mut part.fields {
                        if self.migrator.migrate_in_place(&mut field.settings)? {
                            migrated += 1;
                        }
                    }
                    Ok(migrated > 0)
                })
                .map_err(MigrationError::SchemaRead)?;

            if altered {
                tracing::debug!(
                    part = %part_definition.name,
                    migrated,
                    "part settings migrated"
                );
                report.settings_migrated += migrated;
                report.definitions_altered += 1;
            }
        }
        Ok(())
    }
}
