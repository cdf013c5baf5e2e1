//! Migration orchestrator: decides which data migrations a tenant needs and
//! drives them to completion.
//!
//! Definition changes run first; deferred document rewrites run once those
//! changes are flushed; versions are recorded last. A failure anywhere
//! leaves the recorded version behind so the next activation retries.

use super::deferred::{DeferredScope, UnitOfWork};
use super::error::MigrationError;
use super::lock::TenantLocks;
use super::rewrite::{default_rewrite_rules, RewriteRule};
use super::state::VersionRecordStore;
use crate::catalog::DefinitionStore;
use crate::settings::SettingsKeys;
use crate::storage::{ConnectionProvider, DocumentStoreConfig};
use std::sync::Arc;

/// Migration configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Layout of the document store the rewrites target.
    pub documents: DocumentStoreConfig,
    /// Legacy and unified settings key names.
    pub keys: SettingsKeys,
    /// Document rewrites scheduled by the search index upgrade.
    pub rules: Vec<RewriteRule>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            documents: DocumentStoreConfig::default(),
            keys: SettingsKeys::default(),
            rules: default_rewrite_rules(),
        }
    }
}

impl MigrationConfig {
    /// Set the document store layout.
    pub fn with_documents(mut self, documents: DocumentStoreConfig) -> Self {
        self.documents = documents;
        self
    }

    /// Set the settings keys.
    pub fn with_keys(mut self, keys: SettingsKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Replace the rewrite rules.
    pub fn with_rules(mut self, rules: Vec<RewriteRule>) -> Self {
        self.rules = rules;
        self
    }
}

/// What a migration step can touch.
pub struct MigrationContext<'a> {
    /// Tenant being migrated.
    pub tenant: &'a str,
    /// Content definitions of the tenant.
    pub definitions: &'a dyn DefinitionStore,
    /// Installed versions and feature sets.
    pub versions: &'a dyn VersionRecordStore,
    /// Migration configuration.
    pub config: &'a MigrationConfig,
    /// Unit of work collecting post-commit tasks.
    pub uow: &'a mut UnitOfWork,
}

impl MigrationContext<'_> {
    /// Whether the tenant had `feature` installed before this activation.
    pub fn was_feature_installed(&self, feature: &str) -> Result<bool, MigrationError> {
        self.versions.was_feature_installed(self.tenant, feature)
    }
}

/// A versioned data migration for one feature.
pub trait DataMigration: Send + Sync {
    /// Feature this migration belongs to.
    fn feature_id(&self) -> &str;

    /// Version reached once every step has run.
    fn latest_version(&self) -> u64;

    /// Run on a tenant with no recorded version. Returns the version reached.
    fn create(&self, ctx: &mut MigrationContext<'_>) -> Result<u64, MigrationError>;

    /// Upgrade from `version`. Returns the version reached, or `None` when no
    /// step starts at `version`.
    fn upgrade_from(
        &self,
        version: u64,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<Option<u64>, MigrationError> {
        let _ = (version, ctx);
        Ok(None)
    }
}

/// A migration that moved a feature to a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Feature identifier.
    pub feature: String,
    /// Version before the activation; `None` for a first install.
    pub from_version: Option<u64>,
    /// Version recorded after the activation.
    pub to_version: u64,
}

/// Summary of one tenant activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Tenant name.
    pub tenant: String,
    /// Migrations that advanced a version.
    pub applied: Vec<AppliedMigration>,
    /// Features already at their latest version.
    pub up_to_date: Vec<String>,
    /// Deferred tasks run after commit.
    pub deferred_tasks_run: usize,
}

impl ActivationReport {
    /// Whether the activation changed nothing.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.deferred_tasks_run == 0
    }
}

/// Installed vs latest version of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureStatus {
    /// Feature identifier.
    pub feature: String,
    /// Recorded version, if any.
    pub installed: Option<u64>,
    /// Latest version the registered migration knows.
    pub latest: u64,
    /// Whether the feature is in the tenant's installed set.
    pub feature_installed: bool,
}

impl FeatureStatus {
    /// Whether activation would do nothing for this feature.
    pub fn is_current(&self) -> bool {
        self.installed.is_some_and(|v| v >= self.latest)
    }
}

/// Runs registered data migrations per tenant.
pub struct MigrationOrchestrator {
    definitions: Arc<dyn DefinitionStore>,
    versions: Arc<dyn VersionRecordStore>,
    connections: Arc<dyn ConnectionProvider>,
    config: MigrationConfig,
    migrations: Vec<Box<dyn DataMigration>>,
    locks: TenantLocks,
}

impl MigrationOrchestrator {
    /// Create an orchestrator with no migrations registered.
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        versions: Arc<dyn VersionRecordStore>,
        connections: Arc<dyn ConnectionProvider>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            definitions,
            versions,
            connections,
            config,
            migrations: Vec::new(),
            locks: TenantLocks::new(),
        }
    }

    /// Register a migration. Migrations run in registration order.
    pub fn register(&mut self, migration: impl DataMigration + 'static) -> &mut Self {
        self.migrations.push(Box::new(migration));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_migration(mut self, migration: impl DataMigration + 'static) -> Self {
        self.register(migration);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Bring every registered feature of `tenant` to its latest version.
    ///
    /// Activations of the same tenant are serialized.
    pub fn activate(&self, tenant: &str) -> Result<ActivationReport, MigrationError> {
        self.locks
            .with_lock(tenant, || self.activate_locked(tenant))
    }

    fn activate_locked(&self, tenant: &str) -> Result<ActivationReport, MigrationError> {
        let mut report = ActivationReport {
            tenant: tenant.to_string(),
            ..Default::default()
        };
        let mut uow = UnitOfWork::new();

        for migration in &self.migrations {
            let feature = migration.feature_id();
            let latest = migration.latest_version();
            let installed = self.versions.get_installed_version(tenant, feature)?;

            if installed.is_some_and(|v| v >= latest) {
                tracing::debug!(tenant, feature, version = latest, "feature up to date");
                report.up_to_date.push(feature.to_string());
                continue;
            }

            let mut ctx = MigrationContext {
                tenant,
                definitions: self.definitions.as_ref(),
                versions: self.versions.as_ref(),
                config: &self.config,
                uow: &mut uow,
            };

            let mut version = match installed {
                Some(version) => version,
                None => {
                    tracing::info!(tenant, feature, "running initial migration");
                    migration.create(&mut ctx)?
                }
            };

            while version < latest {
                match migration.upgrade_from(version, &mut ctx)? {
                    Some(next) if next > version => {
                        tracing::info!(tenant, feature, from_version = version, to_version = next, "upgrade step applied");
                        version = next;
                    }
                    Some(returned) => {
                        return Err(MigrationError::StepDidNotAdvance {
                            feature: feature.to_string(),
                            from_version: version,
                            returned,
                        });
                    }
                    None => {
                        tracing::warn!(tenant, feature, version, latest, "no upgrade step from version");
                        break;
                    }
                }
            }

            if installed != Some(version) {
                report.applied.push(AppliedMigration {
                    feature: feature.to_string(),
                    from_version: installed,
                    to_version: version,
                });
            }
        }

        if report.applied.is_empty() && uow.pending() == 0 {
            return Ok(report);
        }

        let scope = DeferredScope {
            tenant,
            connections: self.connections.as_ref(),
            documents: &self.config.documents,
        };
        report.deferred_tasks_run = uow.commit(self.definitions.as_ref(), &scope)?;

        for applied in &report.applied {
            self.versions
                .set_installed_version(tenant, &applied.feature, applied.to_version)?;
            self.versions
                .mark_feature_installed(tenant, &applied.feature)?;
        }

        tracing::info!(
            tenant,
            applied = report.applied.len(),
            deferred = report.deferred_tasks_run,
            "tenant activation complete"
        );
        Ok(report)
    }

    /// Installed vs latest version of every registered feature.
    pub fn status(&self, tenant: &str) -> Result<Vec<FeatureStatus>, MigrationError> {
        self.migrations
            .iter()
            .map(|migration| {
                let feature = migration.feature_id();
                Ok(FeatureStatus {
                    feature: feature.to_string(),
                    installed: self.versions.get_installed_version(tenant, feature)?,
                    latest: migration.latest_version(),
                    feature_installed: self.versions.was_feature_installed(tenant, feature)?,
                })
            })
            .collect()
    }
}
