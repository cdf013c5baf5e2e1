//! Search index settings migration.
//!
//! New installations need no upgrade, but there is no migration record from
//! before the module rename either. The upgrade therefore runs from `create`,
//! and only when the tenant already had the feature installed.

use super::executor::{DataMigration, MigrationContext};
use super::error::MigrationError;
use super::rewrite::schedule_rewrite;
use super::walker::DefinitionWalker;
use crate::settings::SettingsMigrator;

/// Feature identifier of the search index module.
pub const SEARCH_FEATURE_ID: &str = "OrchardCore.Search.Lucene";

/// Migrates legacy index settings and renames stale document type tags.
#[derive(Debug, Clone)]
pub struct SearchIndexMigration {
    feature_id: String,
}

impl Default for SearchIndexMigration {
    fn default() -> Self {
        Self::new(SEARCH_FEATURE_ID)
    }
}

impl SearchIndexMigration {
    /// Migration registered under `feature_id`.
    pub fn new(feature_id: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
        }
    }

    fn upgrade(&self, ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
        let migrator = SettingsMigrator::new(ctx.config.keys.clone());
        let report = DefinitionWalker::new(ctx.definitions, &migrator).upgrade_definitions()?;
        tracing::info!(
            tenant = ctx.tenant,
            migrated = report.settings_migrated,
            altered = report.definitions_altered,
            "legacy index settings migrated"
        );

        if !ctx.config.rules.is_empty() {
            schedule_rewrite(ctx.uow, ctx.config.rules.clone());
        }
        Ok(())
    }
}

impl DataMigration for SearchIndexMigration {
    fn feature_id(&self) -> &str {
        &self.feature_id
    }

    fn latest_version(&self) -> u64 {
        1
    }

    fn create(&self, ctx: &mut MigrationContext<'_>) -> Result<u64, MigrationError> {
        if ctx.was_feature_installed(&self.feature_id)? {
            self.upgrade(ctx)?;
        } else {
            tracing::debug!(tenant = ctx.tenant, "fresh install, nothing to upgrade");
        }

        // Shortcut later steps on new definition schemas.
        Ok(1)
    }
}
