//! Migration-specific error types.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Definitions could not be read or contained malformed settings.
    /// The version record is left unchanged.
    #[error("failed to read content definitions: {0}")]
    SchemaRead(#[source] crate::error::Error),

    /// The deferred document rewrite failed and was rolled back in full.
    #[error("document rewrite failed {}: {source}", describe_rule(.rule_index))]
    RewriteTransaction {
        /// Index of the rule that failed; `None` when opening, beginning or
        /// committing the transaction failed.
        rule_index: Option<usize>,
        /// Underlying failure.
        #[source]
        source: crate::error::Error,
    },

    /// Attempt to move an installed version backwards.
    #[error("version regression for {tenant}/{feature}: installed {current}, requested {requested}")]
    VersionRegression {
        /// Tenant name.
        tenant: String,
        /// Feature identifier.
        feature: String,
        /// Currently installed version.
        current: u64,
        /// Version that was requested.
        requested: u64,
    },

    /// A migration step reported an inconsistent version.
    #[error("step for {feature} from version {from_version} did not advance (returned {returned})")]
    StepDidNotAdvance {
        /// Feature identifier.
        feature: String,
        /// Version the step started from.
        from_version: u64,
        /// Version the step returned.
        returned: u64,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

fn describe_rule(rule_index: &Option<usize>) -> String {
    match rule_index {
        Some(index) => format!("at rule {}", index),
        None => "in transaction".to_string(),
    }
}

impl MigrationError {
    /// Whether retrying on the next activation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MigrationError::SchemaRead(_)
                | MigrationError::RewriteTransaction { .. }
                | MigrationError::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_error_display() {
        let err = MigrationError::VersionRegression {
            tenant: "Default".to_string(),
            feature: "search.lucene".to_string(),
            current: 2,
            requested: 1,
        };
        assert!(err.to_string().contains("Default/search.lucene"));
    }

    #[test]
    fn test_rewrite_error_keeps_source() {
        let err = MigrationError::RewriteTransaction {
            rule_index: Some(3),
            source: Error::InvalidData("boom".to_string()),
        };
        assert!(err.to_string().contains("rule 3"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_schema_read_is_retryable() {
        let err = MigrationError::SchemaRead(Error::NotFound("BlogPost".to_string()));
        assert!(err.is_retryable());

        let err = MigrationError::Serialization("bad".to_string());
        assert!(!err.is_retryable());
    }
}
