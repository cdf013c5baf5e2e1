//! Legacy-to-unified settings migration.
//!
//! One algorithm shared by every call site: type-level part settings, part
//! settings and field settings.

use super::model::{LegacyIndexSettings, UnifiedIndexSettings};
use crate::catalog::SettingsMap;
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Settings key used by releases before the module rename.
pub const LEGACY_SETTINGS_KEY: &str = "ContentIndexSettings";

/// Settings key of the unified block.
pub const UNIFIED_SETTINGS_KEY: &str = "LuceneContentIndexSettings";

/// Names of the settings keys the migrator moves between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsKeys {
    /// Key holding the legacy block.
    pub legacy: String,
    /// Key the unified block is written under.
    pub unified: String,
}

impl Default for SettingsKeys {
    fn default() -> Self {
        Self {
            legacy: LEGACY_SETTINGS_KEY.to_string(),
            unified: UNIFIED_SETTINGS_KEY.to_string(),
        }
    }
}

/// Pure, idempotent settings transform.
#[derive(Debug, Clone, Default)]
pub struct SettingsMigrator {
    keys: SettingsKeys,
}

impl SettingsMigrator {
    /// Create a migrator for the given key names.
    pub fn new(keys: SettingsKeys) -> Self {
        Self { keys }
    }

    /// The key names in use.
    pub fn keys(&self) -> &SettingsKeys {
        &self.keys
    }

    /// Whether `settings` still needs migrating.
    pub fn needs_migration(&self, settings: &SettingsMap) -> bool {
        settings.contains_key(&self.keys.legacy) && !settings.contains_key(&self.keys.unified)
    }

    /// Migrate a settings map.
    ///
    /// Returns the input unchanged with `false` when there is no legacy block
    /// or the unified block already exists.
    pub fn migrate(&self, settings: &SettingsMap) -> Result<(SettingsMap, bool), Error> {
        if !self.needs_migration(settings) {
            return Ok((settings.clone(), false));
        }

        let mut migrated = settings.clone();
        let block = migrated
            .remove(&self.keys.legacy)
            .ok_or_else(|| Error::malformed(&self.keys.legacy, "legacy block vanished"))?;

        let legacy = LegacyIndexSettings::from_value(&self.keys.legacy, &block)?;
        let unified = UnifiedIndexSettings::from_legacy(legacy);
        migrated.insert(self.keys.unified.clone(), unified.to_value()?);

        Ok((migrated, true))
    }

    /// Migrate a settings map in place. On error the map is left untouched.
    pub fn migrate_in_place(&self, settings: &mut SettingsMap) -> Result<bool, Error> {
        let (migrated, changed) = self.migrate(settings)?;
        if changed {
            *settings = migrated;
        }
        Ok(changed)
    }
}
