//! indexmig core - Content-index settings migration engine.
//!
//! Migrates legacy search index settings stored in content definitions into
//! the unified settings block, then rewrites stale type tags in serialized
//! documents, once per tenant.

pub mod catalog;
pub mod error;
pub mod migration;
pub mod settings;
pub mod storage;

pub use catalog::{
    ContentTypeDefinition, DefinitionStore, FieldDefinition, PartDefinition, SettingsMap,
    SledDefinitionStore, TypePartDefinition,
};
pub use error::Error;
pub use migration::{
    ActivationReport, DataMigration, DefinitionWalker, DocumentRewriter, FeatureStatus,
    MigrationConfig, MigrationError, MigrationOrchestrator, RewriteRule, SearchIndexMigration,
    SledVersionStore, UnitOfWork, VersionRecordStore,
};
pub use settings::{SettingsKeys, SettingsMigrator, UnifiedIndexSettings};
pub use storage::{
    ConnectionProvider, DialectKind, DocumentStoreConfig, IsolationLevel, SqliteConnectionProvider,
    StorageConfig,
};
