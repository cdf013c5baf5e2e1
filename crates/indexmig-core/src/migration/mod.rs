//! Migration engine for content-index settings.
//!
//! This module provides:
//! - A definition walker applying the settings migrator to every definition
//! - A deferred, all-or-nothing document rewrite run after definitions commit
//! - Per-tenant version records so each migration runs once
//! - An orchestrator serializing activations per tenant
//!
//! # Ordering
//!
//! | Phase | Effect | On failure |
//! |-------|--------|------------|
//! | Walk | Definitions altered one at a time | Partial, re-run skips migrated ones |
//! | Commit | Definitions flushed, deferred rewrite run in one transaction | Rewrite rolled back |
//! | Record | Version stored, feature marked installed | Next activation retries |
//!
//! # Example
//!
//! ```ignore
//! use indexmig_core::migration::{MigrationConfig, MigrationOrchestrator, SearchIndexMigration};
//!
//! let orchestrator = MigrationOrchestrator::new(definitions, versions, connections, MigrationConfig::default())
//!     .with_migration(SearchIndexMigration::default());
//!
//! let report = orchestrator.activate("Default")?;
//! println!("applied {} migrations", report.applied.len());
//! ```

pub mod deferred;
pub mod error;
pub mod executor;
pub mod lock;
pub mod rewrite;
pub mod search;
pub mod state;
pub mod walker;

pub use deferred::{DeferredScope, DeferredTask, UnitOfWork};
pub use error::MigrationError;
pub use executor::{
    ActivationReport, AppliedMigration, DataMigration, FeatureStatus, MigrationConfig,
    MigrationContext, MigrationOrchestrator,
};
pub use lock::TenantLocks;
pub use rewrite::{
    default_rewrite_rules, schedule_rewrite, DocumentRewriter, RewriteReport, RewriteRule,
    REWRITE_TASK_NAME,
};
pub use search::{SearchIndexMigration, SEARCH_FEATURE_ID};
pub use state::{MigrationRecord, SledVersionStore, VersionRecordStore};
pub use walker::{DefinitionWalker, WalkReport};
