//! Deferred bulk rewrite of serialized documents.
//!
//! Renames stale type tags inside stored documents after a module rename.
//! All rules run inside one transaction: either every rule's effect is
//! committed or none is.

use super::deferred::UnitOfWork;
use super::error::MigrationError;
use crate::storage::{ConnectionProvider, DocumentStoreConfig, CONTENT_COLUMN, TYPE_COLUMN};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// Name under which the rewrite is scheduled on a unit of work.
pub const REWRITE_TASK_NAME: &str = "document-rewrite";

/// One rewrite applied to the document table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewriteRule {
    /// Plain substring replacement inside the serialized payload of rows
    /// whose type discriminator equals `document_type`.
    ///
    /// `old` must be unambiguous within the payload; fully-qualified type
    /// tags are.
    ReplaceContent {
        /// Discriminator value of the rows to touch.
        document_type: String,
        /// Substring to replace.
        old: String,
        /// Replacement.
        new: String,
    },
    /// Rename the type discriminator itself.
    RenameType {
        /// Current discriminator value.
        old_type: String,
        /// New discriminator value.
        new_type: String,
    },
}

impl RewriteRule {
    /// Replace `old` with `new` in documents of `document_type`.
    pub fn replace_content(
        document_type: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        RewriteRule::ReplaceContent {
            document_type: document_type.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    /// Rename documents of `old_type` to `new_type`.
    pub fn rename_type(old_type: impl Into<String>, new_type: impl Into<String>) -> Self {
        RewriteRule::RenameType {
            old_type: old_type.into(),
            new_type: new_type.into(),
        }
    }
}

const QUERIES_DOCUMENT: &str = "OrchardCore.Queries.Services.QueriesDocument, OrchardCore.Queries";
const DEPLOYMENT_PLAN: &str =
    "OrchardCore.Deployment.DeploymentPlan, OrchardCore.Deployment.Abstractions";

fn type_tag(type_name: &str, assembly: &str) -> String {
    format!("\"$type\":\"{}, {}\"", type_name, assembly)
}

/// Rules for the `OrchardCore.Lucene` to `OrchardCore.Search.Lucene` rename:
/// saved queries, the four deployment steps, and the index-settings document.
pub fn default_rewrite_rules() -> Vec<RewriteRule> {
    let old_assembly = "OrchardCore.Lucene";
    let new_assembly = "OrchardCore.Search.Lucene";

    let mut rules = vec![RewriteRule::replace_content(
        QUERIES_DOCUMENT,
        type_tag("OrchardCore.Lucene.LuceneQuery", old_assembly),
        type_tag("OrchardCore.Search.Lucene.LuceneQuery", new_assembly),
    )];

    for step in [
        "LuceneIndexDeploymentStep",
        "LuceneSettingsDeploymentStep",
        "LuceneIndexResetDeploymentStep",
        "LuceneIndexRebuildDeploymentStep",
    ] {
        rules.push(RewriteRule::replace_content(
            DEPLOYMENT_PLAN,
            type_tag(&format!("OrchardCore.Lucene.Deployment.{}", step), old_assembly),
            type_tag(
                &format!("OrchardCore.Search.Lucene.Deployment.{}", step),
                new_assembly,
            ),
        ));
    }

    rules.push(RewriteRule::rename_type(
        "OrchardCore.Lucene.Model.LuceneIndexSettingsDocument, OrchardCore.Lucene",
        "OrchardCore.Search.Lucene.Model.LuceneIndexSettingsDocument, OrchardCore.Search.Lucene",
    ));
    rules
}

/// Outcome of a committed rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Rows matched by each rule, in rule order.
    pub rows_per_rule: Vec<usize>,
}

impl RewriteReport {
    /// Total rows matched across all rules.
    pub fn total_rows(&self) -> usize {
        self.rows_per_rule.iter().sum()
    }
}

/// Executes rewrite rules against the document table.
pub struct DocumentRewriter<'a> {
    connections: &'a dyn ConnectionProvider,
    config: &'a DocumentStoreConfig,
}

impl<'a> DocumentRewriter<'a> {
    /// Create a rewriter.
    pub fn new(connections: &'a dyn ConnectionProvider, config: &'a DocumentStoreConfig) -> Self {
        Self {
            connections,
            config,
        }
    }

    /// Build the statement for `rule` in the configured dialect.
    pub fn statement(&self, rule: &RewriteRule) -> String {
        let dialect = self.config.dialect.dialect();
        let table = dialect.quote_for_table_name(
            &self.config.document_table_name(),
            self.config.schema.as_deref(),
        );
        let content = dialect.quote_for_column_name(CONTENT_COLUMN);
        let doc_type = dialect.quote_for_column_name(TYPE_COLUMN);

        match rule {
            RewriteRule::ReplaceContent { .. } => format!(
                "UPDATE {table} SET {content} = REPLACE({content}, {p1}, {p2}) WHERE {doc_type} = {p3}",
                p1 = dialect.parameter(1),
                p2 = dialect.parameter(2),
                p3 = dialect.parameter(3),
            ),
            RewriteRule::RenameType { .. } => format!(
                "UPDATE {table} SET {doc_type} = {p1} WHERE {doc_type} = {p2}",
                p1 = dialect.parameter(1),
                p2 = dialect.parameter(2),
            ),
        }
    }

    /// Run every rule in one transaction.
    ///
    /// On failure the transaction is rolled back, the error is logged, and
    /// the failure is returned; nothing is retried here.
    pub fn execute(&self, rules: &[RewriteRule]) -> Result<RewriteReport, MigrationError> {
        if let Some(schema) = self.config.ignored_schema() {
            tracing::warn!(
                schema,
                dialect = %self.config.dialect,
                "schema is not supported by the dialect and is ignored"
            );
        }

        let mut conn = self
            .connections
            .connect()
            .map_err(|source| MigrationError::RewriteTransaction {
                rule_index: None,
                source,
            })?;

        let tx = conn
            .transaction_with_behavior(self.config.isolation_level.transaction_behavior())
            .map_err(|e| MigrationError::RewriteTransaction {
                rule_index: None,
                source: e.into(),
            })?;

        tracing::debug!(
            rules = rules.len(),
            isolation = %self.config.isolation_level,
            "updating search index settings and queries"
        );

        let mut report = RewriteReport::default();
        for (index, rule) in rules.iter().enumerate() {
            let sql = self.statement(rule);
            let result = match rule {
                RewriteRule::ReplaceContent {
                    document_type,
                    old,
                    new,
                } => tx.execute(&sql, params![old, new, document_type]),
                RewriteRule::RenameType { old_type, new_type } => {
                    tx.execute(&sql, params![new_type, old_type])
                }
            };

            match result {
                Ok(rows) => report.rows_per_rule.push(rows),
                Err(e) => {
                    if let Err(rollback) = tx.rollback() {
                        tracing::warn!(error = %rollback, "rollback after failed rewrite also failed");
                    }
                    tracing::error!(
                        rule_index = index,
                        rule = ?rule,
                        error = %e,
                        "an error occurred while rewriting search index documents"
                    );
                    return Err(MigrationError::RewriteTransaction {
                        rule_index: Some(index),
                        source: e.into(),
                    });
                }
            }
        }

        tx.commit().map_err(|e| {
            tracing::error!(error = %e, "failed to commit document rewrite");
            MigrationError::RewriteTransaction {
                rule_index: None,
                source: e.into(),
            }
        })?;

        tracing::info!(rows = report.total_rows(), "document rewrite committed");
        Ok(report)
    }
}

/// Schedule `rules` to run once `uow` has committed.
pub fn schedule_rewrite(uow: &mut UnitOfWork, rules: Vec<RewriteRule>) {
    uow.defer(REWRITE_TASK_NAME, move |scope| {
        let report = DocumentRewriter::new(scope.connections, scope.documents).execute(&rules)?;
        tracing::info!(
            tenant = scope.tenant,
            rows = report.total_rows(),
            "deferred document rewrite finished"
        );
        Ok(())
    });
}
