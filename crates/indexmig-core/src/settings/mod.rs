//! Index settings model and the legacy-to-unified migrator.

mod migrator;
mod model;

pub use migrator::{SettingsKeys, SettingsMigrator, LEGACY_SETTINGS_KEY, UNIFIED_SETTINGS_KEY};
pub use model::{LegacyIndexSettings, UnifiedIndexSettings};
