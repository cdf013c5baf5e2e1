//! Integration tests for tenant activation: definitions, document rewrites
//! and version records together.

use indexmig_core::catalog::{
    AlterFn, ContentTypeDefinition, DefinitionStore, FieldDefinition, PartDefinition,
    SledDefinitionStore, TypePartDefinition,
};
use indexmig_core::migration::{
    MigrationConfig, MigrationError, MigrationOrchestrator, SearchIndexMigration,
    SledVersionStore, VersionRecordStore, SEARCH_FEATURE_ID,
};
use indexmig_core::settings::SettingsMigrator;
use indexmig_core::storage::{
    ConnectionProvider, DocumentStoreConfig, DocumentTable, SqliteConnectionProvider,
};
use indexmig_core::Error;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const QUERIES_TYPE: &str = "OrchardCore.Queries.Services.QueriesDocument, OrchardCore.Queries";
const PLAN_TYPE: &str = "OrchardCore.Deployment.DeploymentPlan, OrchardCore.Deployment.Abstractions";
const OLD_SETTINGS_TYPE: &str =
    "OrchardCore.Lucene.Model.LuceneIndexSettingsDocument, OrchardCore.Lucene";
const NEW_SETTINGS_TYPE: &str =
    "OrchardCore.Search.Lucene.Model.LuceneIndexSettingsDocument, OrchardCore.Search.Lucene";

const OLD_QUERY: &str =
    r#"{"Queries":{"Search":{"$type":"OrchardCore.Lucene.LuceneQuery, OrchardCore.Lucene","Index":"Search"}}}"#;
const NEW_QUERY: &str =
    r#"{"Queries":{"Search":{"$type":"OrchardCore.Search.Lucene.LuceneQuery, OrchardCore.Search.Lucene","Index":"Search"}}}"#;
const OLD_PLAN: &str = r#"{"DeploymentSteps":[{"$type":"OrchardCore.Lucene.Deployment.LuceneIndexDeploymentStep, OrchardCore.Lucene","IncludeAll":true},{"$type":"OrchardCore.Lucene.Deployment.LuceneIndexRebuildDeploymentStep, OrchardCore.Lucene"}]}"#;
const NEW_PLAN: &str = r#"{"DeploymentSteps":[{"$type":"OrchardCore.Search.Lucene.Deployment.LuceneIndexDeploymentStep, OrchardCore.Search.Lucene","IncludeAll":true},{"$type":"OrchardCore.Search.Lucene.Deployment.LuceneIndexRebuildDeploymentStep, OrchardCore.Search.Lucene"}]}"#;

/// Counts alters reaching the store and alters that persisted a change.
struct CountingStore {
    inner: SledDefinitionStore,
    alters: AtomicUsize,
    persisted: AtomicUsize,
}

impl CountingStore {
    fn record(&self, result: Result<bool, Error>) -> Result<bool, Error> {
        self.alters.fetch_add(1, Ordering::SeqCst);
        if let Ok(true) = result {
            self.persisted.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

impl DefinitionStore for CountingStore {
    fn load_type_definitions(&self) -> Result<Vec<ContentTypeDefinition>, Error> {
        self.inner.load_type_definitions()
    }

    fn load_part_definitions(&self) -> Result<Vec<PartDefinition>, Error> {
        self.inner.load_part_definitions()
    }

    fn alter_type_part_definition(
        &self,
        type_name: &str,
        part_name: &str,
        alter: &mut AlterFn<'_, TypePartDefinition>,
    ) -> Result<bool, Error> {
        let result = self.inner.alter_type_part_definition(type_name, part_name, alter);
        self.record(result)
    }

    fn alter_part_definition(
        &self,
        name: &str,
        alter: &mut AlterFn<'_, PartDefinition>,
    ) -> Result<bool, Error> {
        let result = self.inner.alter_part_definition(name, alter);
        self.record(result)
    }

    fn flush(&self) -> Result<(), Error> {
        self.inner.flush()
    }
}

struct TestContext {
    definitions: Arc<CountingStore>,
    versions: Arc<SledVersionStore>,
    connections: Arc<SqliteConnectionProvider>,
    table: DocumentTable,
    orchestrator: MigrationOrchestrator,
    _db: sled::Db,
    _documents_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let documents_dir = tempfile::tempdir().unwrap();

        let definitions = Arc::new(CountingStore {
            inner: SledDefinitionStore::open(&db).unwrap(),
            alters: AtomicUsize::new(0),
            persisted: AtomicUsize::new(0),
        });
        let versions = Arc::new(SledVersionStore::open(&db).unwrap());
        let connections = Arc::new(SqliteConnectionProvider::file(
            documents_dir.path().join("documents.db"),
        ));

        let config = MigrationConfig::default();
        let table = DocumentTable::new(&config.documents);
        let conn = connections.connect().unwrap();
        table.create(&conn).unwrap();
        // Every row update leaves a trace, so tests can prove zero writes.
        conn.execute_batch(
            "CREATE TABLE Audit (Id INTEGER);
             CREATE TRIGGER audit_updates AFTER UPDATE ON \"Document\"
             BEGIN INSERT INTO Audit VALUES (OLD.\"Id\"); END;",
        )
        .unwrap();

        let orchestrator = MigrationOrchestrator::new(
            definitions.clone(),
            versions.clone(),
            connections.clone(),
            config,
        )
        .with_migration(SearchIndexMigration::default());

        Self {
            definitions,
            versions,
            connections,
            table,
            orchestrator,
            _db: db,
            _documents_dir: documents_dir,
        }
    }

    fn store(&self) -> &SledDefinitionStore {
        &self.definitions.inner
    }

    fn conn(&self) -> rusqlite::Connection {
        self.connections.connect().unwrap()
    }

    fn document(&self, id: i64) -> String {
        self.table.get(&self.conn(), id).unwrap().unwrap().content
    }

    fn audited_updates(&self) -> i64 {
        self.conn()
            .query_row("SELECT COUNT(*) FROM Audit", [], |row| row.get(0))
            .unwrap()
    }

    fn persisted_alters(&self) -> usize {
        self.definitions.persisted.load(Ordering::SeqCst)
    }

    fn mark_previously_installed(&self) {
        self.versions
            .mark_feature_installed("Default", SEARCH_FEATURE_ID)
            .unwrap();
    }

    fn installed_version(&self) -> Option<u64> {
        self.versions
            .get_installed_version("Default", SEARCH_FEATURE_ID)
            .unwrap()
    }
}

struct SeededDocuments {
    query: i64,
    plan: i64,
    settings: i64,
    unrelated: i64,
}

fn seed_definitions(store: &SledDefinitionStore) {
    store
        .store_type_definition(
            &ContentTypeDefinition::new("BlogPost")
                .with_part(TypePartDefinition::new("TitlePart").with_setting(
                    "ContentIndexSettings",
                    json!({"Included": true, "Analyzed": false, "Tokenized": true}),
                ))
                .with_part(
                    TypePartDefinition::new("BodyPart")
                        .with_setting("ContentIndexSettings", json!({"Included": true, "Analyzed": true})),
                ),
        )
        .unwrap();
    store
        .store_part_definition(
            &PartDefinition::new("BlogPost")
                .with_setting("ContentIndexSettings", json!({"Included": false}))
                .with_field(
                    FieldDefinition::new("Subtitle", "TextField").with_setting(
                        "ContentIndexSettings",
                        json!({"Included": true, "Template": "{{ Model.Text }}"}),
                    ),
                )
                .with_field(
                    FieldDefinition::new("Tags", "TaxonomyField")
                        .with_setting("ContentIndexSettings", json!({"Analyzed": true})),
                ),
        )
        .unwrap();
}

fn seed_documents(ctx: &TestContext) -> SeededDocuments {
    let conn = ctx.conn();
    SeededDocuments {
        query: ctx.table.insert(&conn, QUERIES_TYPE, OLD_QUERY).unwrap(),
        plan: ctx.table.insert(&conn, PLAN_TYPE, OLD_PLAN).unwrap(),
        settings: ctx.table.insert(&conn, OLD_SETTINGS_TYPE, "{}").unwrap(),
        // Old tag inside a document type no rule targets.
        unrelated: ctx.table.insert(&conn, "Other.Document, Other", OLD_QUERY).unwrap(),
    }
}

fn assert_definitions_migrated(store: &SledDefinitionStore) {
    let blog = store.get_type_definition("BlogPost").unwrap().unwrap();
    let title = &blog.part("TitlePart").unwrap().settings;
    assert!(!title.contains_key("ContentIndexSettings"));
    assert_eq!(
        title["LuceneContentIndexSettings"],
        json!({"Included": true, "Keyword": true})
    );
    assert_eq!(
        blog.part("BodyPart").unwrap().settings["LuceneContentIndexSettings"],
        json!({"Included": true})
    );

    let part = store.get_part_definition("BlogPost").unwrap().unwrap();
    assert_eq!(
        part.settings["LuceneContentIndexSettings"],
        json!({"Included": false})
    );
    assert_eq!(
        part.field("Subtitle").unwrap().settings["LuceneContentIndexSettings"],
        json!({"Included": true, "Keyword": true})
    );
    assert_eq!(
        part.field("Tags").unwrap().settings["LuceneContentIndexSettings"],
        json!({})
    );
}

#[test]
fn test_upgrade_of_previous_install() {
    let ctx = TestContext::new();
    seed_definitions(ctx.store());
    let docs = seed_documents(&ctx);
    ctx.mark_previously_installed();

    let report = ctx.orchestrator.activate("Default").unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].from_version, None);
    assert_eq!(report.applied[0].to_version, 1);
    assert_eq!(report.deferred_tasks_run, 1);
    assert_eq!(ctx.installed_version(), Some(1));

    assert_definitions_migrated(ctx.store());
    assert_eq!(ctx.document(docs.query), NEW_QUERY);
    assert_eq!(ctx.document(docs.plan), NEW_PLAN);
    assert_eq!(ctx.document(docs.unrelated), OLD_QUERY);

    let conn = ctx.conn();
    let settings = ctx.table.get(&conn, docs.settings).unwrap().unwrap();
    assert_eq!(settings.doc_type, NEW_SETTINGS_TYPE);
    assert_eq!(ctx.table.count_by_type(&conn, OLD_SETTINGS_TYPE).unwrap(), 0);
}

#[test]
fn test_fresh_install_skips_upgrade() {
    let ctx = TestContext::new();
    seed_definitions(ctx.store());
    let docs = seed_documents(&ctx);

    let report = ctx.orchestrator.activate("Default").unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.deferred_tasks_run, 0);
    assert_eq!(ctx.installed_version(), Some(1));
    assert!(ctx
        .versions
        .was_feature_installed("Default", SEARCH_FEATURE_ID)
        .unwrap());

    assert_eq!(ctx.persisted_alters(), 0);
    assert_eq!(ctx.audited_updates(), 0);
    assert_eq!(ctx.document(docs.query), OLD_QUERY);
    let part = ctx.store().get_part_definition("BlogPost").unwrap().unwrap();
    assert!(part.settings.contains_key("ContentIndexSettings"));
}

#[test]
fn test_latest_version_performs_no_writes() {
    let ctx = TestContext::new();
    seed_definitions(ctx.store());
    seed_documents(&ctx);
    ctx.mark_previously_installed();
    ctx.orchestrator.activate("Default").unwrap();

    let alters = ctx.definitions.alters.load(Ordering::SeqCst);
    let updates = ctx.audited_updates();

    let report = ctx.orchestrator.activate("Default").unwrap();

    assert!(report.is_noop());
    assert_eq!(report.up_to_date, vec![SEARCH_FEATURE_ID.to_string()]);
    assert_eq!(ctx.definitions.alters.load(Ordering::SeqCst), alters);
    assert_eq!(ctx.audited_updates(), updates);
}

#[test]
fn test_failed_rewrite_rolls_back_and_is_retried() {
    let ctx = TestContext::new();
    seed_definitions(ctx.store());
    let docs = seed_documents(&ctx);
    ctx.mark_previously_installed();
    ctx.conn()
        .execute_batch(&format!(
            "CREATE TRIGGER reject_rename BEFORE UPDATE ON \"Document\"
             WHEN NEW.\"Type\" = '{}'
             BEGIN SELECT RAISE(ABORT, 'rename rejected'); END;",
            NEW_SETTINGS_TYPE
        ))
        .unwrap();

    let err = ctx.orchestrator.activate("Default").unwrap_err();

    assert!(matches!(
        err,
        MigrationError::RewriteTransaction {
            rule_index: Some(5),
            ..
        }
    ));
    assert!(err.is_retryable());
    // Rules before the failing one were rolled back with it.
    assert_eq!(ctx.document(docs.query), OLD_QUERY);
    assert_eq!(ctx.document(docs.plan), OLD_PLAN);
    assert_eq!(ctx.audited_updates(), 0);
    assert_eq!(ctx.installed_version(), None);
    // Definitions were committed before the rewrite ran.
    assert_definitions_migrated(ctx.store());

    ctx.conn().execute_batch("DROP TRIGGER reject_rename;").unwrap();
    let persisted = ctx.persisted_alters();

    let report = ctx.orchestrator.activate("Default").unwrap();

    assert_eq!(report.deferred_tasks_run, 1);
    assert_eq!(ctx.persisted_alters(), persisted);
    assert_eq!(ctx.document(docs.query), NEW_QUERY);
    assert_eq!(ctx.document(docs.plan), NEW_PLAN);
    assert_eq!(ctx.installed_version(), Some(1));
}

#[test]
fn test_walker_failure_prevents_rewrite() {
    let ctx = TestContext::new();
    ctx.store()
        .store_part_definition(
            &PartDefinition::new("AlphaPart")
                .with_setting("ContentIndexSettings", json!({"Included": true})),
        )
        .unwrap();
    ctx.store()
        .store_part_definition(
            &PartDefinition::new("BetaPart")
                .with_setting("ContentIndexSettings", json!({"Included": "yes"})),
        )
        .unwrap();
    let docs = seed_documents(&ctx);
    ctx.mark_previously_installed();

    let err = ctx.orchestrator.activate("Default").unwrap_err();

    assert!(matches!(err, MigrationError::SchemaRead(_)));
    assert_eq!(ctx.document(docs.query), OLD_QUERY);
    assert_eq!(ctx.audited_updates(), 0);
    assert_eq!(ctx.installed_version(), None);
    let alpha = ctx.store().get_part_definition("AlphaPart").unwrap().unwrap();
    assert!(alpha.settings.contains_key("LuceneContentIndexSettings"));

    ctx.store()
        .store_part_definition(
            &PartDefinition::new("BetaPart")
                .with_setting("ContentIndexSettings", json!({"Included": true})),
        )
        .unwrap();

    ctx.orchestrator.activate("Default").unwrap();

    let beta = ctx.store().get_part_definition("BetaPart").unwrap().unwrap();
    assert_eq!(
        beta.settings["LuceneContentIndexSettings"],
        json!({"Included": true, "Keyword": true})
    );
    assert_eq!(ctx.document(docs.query), NEW_QUERY);
    assert_eq!(ctx.installed_version(), Some(1));
}

#[test]
fn test_resume_after_partial_walk() {
    let ctx = TestContext::new();
    seed_definitions(ctx.store());
    ctx.mark_previously_installed();

    // Simulate a crash after the type phase completed.
    let migrator = SettingsMigrator::default();
    let mut blog = ctx.store().get_type_definition("BlogPost").unwrap().unwrap();
    for part in &mut blog.parts {
        migrator.migrate_in_place(&mut part.settings).unwrap();
    }
    ctx.store().store_type_definition(&blog).unwrap();

    ctx.orchestrator.activate("Default").unwrap();

    assert_definitions_migrated(ctx.store());
    // Only the standalone part still needed persisting.
    assert_eq!(ctx.persisted_alters(), 1);
}

#[test]
fn test_existing_unified_block_wins() {
    let ctx = TestContext::new();
    ctx.store()
        .store_part_definition(
            &PartDefinition::new("Mixed")
                .with_setting("ContentIndexSettings", json!({"Included": true}))
                .with_setting("LuceneContentIndexSettings", json!({"Included": false})),
        )
        .unwrap();
    ctx.mark_previously_installed();

    ctx.orchestrator.activate("Default").unwrap();

    let mixed = ctx.store().get_part_definition("Mixed").unwrap().unwrap();
    assert_eq!(mixed.settings["ContentIndexSettings"], json!({"Included": true}));
    assert_eq!(
        mixed.settings["LuceneContentIndexSettings"],
        json!({"Included": false})
    );
    assert_eq!(ctx.persisted_alters(), 0);
}

#[test]
fn test_concurrent_activation_runs_once() {
    let ctx = Arc::new(TestContext::new());
    seed_definitions(ctx.store());
    let docs = seed_documents(&ctx);
    ctx.mark_previously_installed();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || ctx.orchestrator.activate("Default").unwrap())
        })
        .collect();
    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(reports.iter().filter(|r| !r.is_noop()).count(), 1);
    assert_eq!(ctx.document(docs.query), NEW_QUERY);
    // Query rule, four deployment-step rules on the plan, settings rename.
    assert_eq!(ctx.audited_updates(), 6);
}

#[test]
fn test_tenants_are_tracked_separately() {
    let ctx = TestContext::new();
    ctx.versions
        .set_installed_version("Blog", SEARCH_FEATURE_ID, 1)
        .unwrap();

    let report = ctx.orchestrator.activate("Blog").unwrap();
    assert!(report.is_noop());
    assert_eq!(ctx.installed_version(), None);

    let status = ctx.orchestrator.status("Default").unwrap();
    assert_eq!(status.len(), 1);
    assert!(!status[0].is_current());
}

#[test]
fn test_custom_document_layout() {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let connections = Arc::new(SqliteConnectionProvider::file(dir.path().join("t.db")));
    let documents = DocumentStoreConfig::default().with_table_prefix("blog_");
    let table = DocumentTable::new(&documents);
    let conn = connections.connect().unwrap();
    table.create(&conn).unwrap();
    let query = table.insert(&conn, QUERIES_TYPE, OLD_QUERY).unwrap();

    let versions = Arc::new(SledVersionStore::open(&db).unwrap());
    versions.mark_feature_installed("Blog", SEARCH_FEATURE_ID).unwrap();
    let orchestrator = MigrationOrchestrator::new(
        Arc::new(SledDefinitionStore::open(&db).unwrap()),
        versions,
        connections,
        MigrationConfig::default().with_documents(documents),
    )
    .with_migration(SearchIndexMigration::default());

    orchestrator.activate("Blog").unwrap();

    assert_eq!(table.get(&conn, query).unwrap().unwrap().content, NEW_QUERY);
}
