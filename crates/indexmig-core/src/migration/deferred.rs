//! Unit of work with a post-commit hook list.
//!
//! Tasks deferred during a migration run only after every definition change
//! of that run has been flushed. Each task runs at most once; a unit of work
//! dropped without committing discards its tasks unrun.

use super::error::MigrationError;
use crate::catalog::DefinitionStore;
use crate::storage::{ConnectionProvider, DocumentStoreConfig};

/// Dependencies handed to deferred tasks when they run.
pub struct DeferredScope<'a> {
    /// Tenant being migrated.
    pub tenant: &'a str,
    /// Document store connections.
    pub connections: &'a dyn ConnectionProvider,
    /// Document store layout.
    pub documents: &'a DocumentStoreConfig,
}

/// A task run after the unit of work commits.
pub type DeferredTask =
    Box<dyn FnOnce(&DeferredScope<'_>) -> Result<(), MigrationError> + Send + 'static>;

/// Collects deferred tasks for one migration run.
#[derive(Default)]
pub struct UnitOfWork {
    deferred: Vec<(String, DeferredTask)>,
}

impl UnitOfWork {
    /// Create an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after commit.
    pub fn defer<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnOnce(&DeferredScope<'_>) -> Result<(), MigrationError> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(task = %name, "deferred task scheduled");
        self.deferred.push((name, Box::new(task)));
    }

    /// Number of tasks waiting for commit.
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Names of the tasks waiting for commit, in run order.
    pub fn pending_names(&self) -> Vec<&str> {
        self.deferred.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Flush `definitions`, then drain the deferred tasks in order.
    ///
    /// The first failing task stops the drain; it and every task after it are
    /// discarded and the failure is returned. Returns how many tasks ran.
    pub fn commit(
        mut self,
        definitions: &dyn DefinitionStore,
        scope: &DeferredScope<'_>,
    ) -> Result<usize, MigrationError> {
        definitions.flush()?;

        let tasks = std::mem::take(&mut self.deferred);
        let mut ran = 0;
        for (name, task) in tasks {
            tracing::debug!(tenant = scope.tenant, task = %name, "running deferred task");
            if let Err(e) = task(scope) {
                tracing::error!(
                    tenant = scope.tenant,
                    task = %name,
                    error = %e,
                    "deferred task failed"
                );
                return Err(e);
            }
            ran += 1;
        }
        Ok(ran)
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.deferred.is_empty() {
            tracing::debug!(
                discarded = self.deferred.len(),
                "unit of work dropped without commit, discarding deferred tasks"
            );
        }
    }
}
