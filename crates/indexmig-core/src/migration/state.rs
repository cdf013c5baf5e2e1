//! Installed-version records and tenant feature sets.
//!
//! A tenant's feature is "installed" once it appears in the tenant's feature
//! set. The migration record tracks which schema version of that feature the
//! tenant's data is at. A feature that is installed but has no migration
//! record predates version tracking and must be upgraded.

use super::error::MigrationError;
use crate::storage::key::{current_timestamp, RecordKey};
use rkyv::{Archive, Deserialize, Serialize};

/// Installed schema version of one feature for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Tenant name.
    pub tenant: String,
    /// Feature identifier.
    pub feature: String,
    /// Installed schema version. Only ever increases.
    pub version: u64,
    /// When the record was last written (microseconds since epoch).
    pub updated_at: u64,
}

impl MigrationRecord {
    /// Create a new record stamped with the current time.
    pub fn new(tenant: impl Into<String>, feature: impl Into<String>, version: u64) -> Self {
        Self {
            tenant: tenant.into(),
            feature: feature.into(),
            version,
            updated_at: current_timestamp(),
        }
    }

    /// Serialize the record to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MigrationError> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| MigrationError::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MigrationError> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| MigrationError::Deserialization(e.to_string()))
    }
}

/// Persistence for installed versions and tenant feature sets.
pub trait VersionRecordStore: Send + Sync {
    /// Installed version of `feature` for `tenant`, if any.
    fn get_installed_version(&self, tenant: &str, feature: &str)
        -> Result<Option<u64>, MigrationError>;

    /// Record the installed version. Fails if it would move backwards.
    fn set_installed_version(
        &self,
        tenant: &str,
        feature: &str,
        version: u64,
    ) -> Result<(), MigrationError>;

    /// Whether the tenant has `feature` in its installed feature set.
    fn was_feature_installed(&self, tenant: &str, feature: &str) -> Result<bool, MigrationError>;

    /// Add `feature` to the tenant's installed feature set.
    fn mark_feature_installed(&self, tenant: &str, feature: &str) -> Result<(), MigrationError>;
}

/// Sled-backed version record store.
pub struct SledVersionStore {
    versions: sled::Tree,
    features: sled::Tree,
}

impl SledVersionStore {
    /// Tree name for migration records.
    pub const VERSIONS_TREE: &'static str = "migration:versions";

    /// Tree name for tenant feature sets.
    pub const FEATURES_TREE: &'static str = "tenant:features";

    /// Open or create the store.
    pub fn open(db: &sled::Db) -> Result<Self, MigrationError> {
        let versions = db
            .open_tree(Self::VERSIONS_TREE)
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        let features = db
            .open_tree(Self::FEATURES_TREE)
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(Self { versions, features })
    }

    /// Load the full record for a tenant's feature.
    pub fn load_record(
        &self,
        tenant: &str,
        feature: &str,
    ) -> Result<Option<MigrationRecord>, MigrationError> {
        let key = RecordKey::new(tenant, feature)?.encode();
        match self
            .versions
            .get(key)
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?
        {
            Some(bytes) => Ok(Some(MigrationRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List the migration records of a tenant.
    pub fn list_records(&self, tenant: &str) -> Result<Vec<MigrationRecord>, MigrationError> {
        let mut records = Vec::new();
        for result in self.versions.scan_prefix(RecordKey::tenant_prefix(tenant)?) {
            let (_, value) =
                result.map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
            records.push(MigrationRecord::from_bytes(&value)?);
        }
        Ok(records)
    }

    /// List the installed features of a tenant.
    pub fn installed_features(&self, tenant: &str) -> Result<Vec<String>, MigrationError> {
        let mut features = Vec::new();
        for result in self.features.scan_prefix(RecordKey::tenant_prefix(tenant)?) {
            let (key, _) =
                result.map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
            let key = RecordKey::decode(&key).ok_or_else(|| {
                MigrationError::Deserialization("invalid feature key".to_string())
            })?;
            features.push(key.feature);
        }
        Ok(features)
    }

    /// Flush changes to disk.
    pub fn flush(&self) -> Result<(), MigrationError> {
        self.versions
            .flush()
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        self.features
            .flush()
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(())
    }
}

impl VersionRecordStore for SledVersionStore {
    fn get_installed_version(
        &self,
        tenant: &str,
        feature: &str,
    ) -> Result<Option<u64>, MigrationError> {
        Ok(self.load_record(tenant, feature)?.map(|r| r.version))
    }

    fn set_installed_version(
        &self,
        tenant: &str,
        feature: &str,
        version: u64,
    ) -> Result<(), MigrationError> {
        let key = RecordKey::new(tenant, feature)?.encode();
        loop {
            let current = self
                .versions
                .get(&key)
                .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;

            if let Some(bytes) = &current {
                let existing = MigrationRecord::from_bytes(bytes)?;
                if existing.version > version {
                    return Err(MigrationError::VersionRegression {
                        tenant: tenant.to_string(),
                        feature: feature.to_string(),
                        current: existing.version,
                        requested: version,
                    });
                }
                if existing.version == version {
                    return Ok(());
                }
            }

            let record = MigrationRecord::new(tenant, feature, version).to_bytes()?;
            let swapped = self
                .versions
                .compare_and_swap(&key, current, Some(record))
                .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
            if swapped.is_ok() {
                return Ok(());
            }
        }
    }

    fn was_feature_installed(&self, tenant: &str, feature: &str) -> Result<bool, MigrationError> {
        self.features
            .contains_key(RecordKey::new(tenant, feature)?.encode())
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))
    }

    fn mark_feature_installed(&self, tenant: &str, feature: &str) -> Result<(), MigrationError> {
        let key = RecordKey::new(tenant, feature)?.encode();
        if self.was_feature_installed(tenant, feature)? {
            return Ok(());
        }
        self.features
            .insert(key, &current_timestamp().to_be_bytes())
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(())
    }
}
