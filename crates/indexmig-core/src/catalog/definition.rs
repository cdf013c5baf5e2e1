//! Content type, part and field definitions.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings attached to a definition, keyed by settings name.
pub type SettingsMap = Map<String, Value>;

/// A content type definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentTypeDefinition {
    /// Type name (unique within the store).
    pub name: String,
    /// Human readable name.
    #[serde(default)]
    pub display_name: String,
    /// Parts attached to the type, in display order.
    #[serde(default)]
    pub parts: Vec<TypePartDefinition>,
    /// Type-level settings.
    #[serde(default)]
    pub settings: SettingsMap,
}

/// A part as attached to one content type.
///
/// Carries its own settings, independent of the standalone part definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypePartDefinition {
    /// Name of the part within the type (unique per type).
    pub name: String,
    /// Name of the standalone part definition this refers to.
    pub part_name: String,
    /// Type-level settings for this part.
    #[serde(default)]
    pub settings: SettingsMap,
}

/// A standalone part definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartDefinition {
    /// Part name (unique within the store).
    pub name: String,
    /// Part settings.
    #[serde(default)]
    pub settings: SettingsMap,
    /// Fields of the part.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// A field within a part.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name (unique per part).
    pub name: String,
    /// Field type name, e.g. `TextField`.
    pub field_type: String,
    /// Field settings.
    #[serde(default)]
    pub settings: SettingsMap,
}

impl ContentTypeDefinition {
    /// Create an empty type definition.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            parts: Vec::new(),
            settings: SettingsMap::new(),
        }
    }

    /// Attach a part.
    pub fn with_part(mut self, part: TypePartDefinition) -> Self {
        self.parts.push(part);
        self
    }

    /// Find an attached part by its name within the type.
    pub fn part(&self, name: &str) -> Option<&TypePartDefinition> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Find an attached part by its name within the type (mutable).
    pub fn part_mut(&mut self, name: &str) -> Option<&mut TypePartDefinition> {
        self.parts.iter_mut().find(|p| p.name == name)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl TypePartDefinition {
    /// Attach the part named `part_name` under the same name.
    pub fn new(part_name: impl Into<String>) -> Self {
        let part_name = part_name.into();
        Self {
            name: part_name.clone(),
            part_name,
            settings: SettingsMap::new(),
        }
    }

    /// Attach the part named `part_name` under a different name.
    pub fn named(name: impl Into<String>, part_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            part_name: part_name.into(),
            settings: SettingsMap::new(),
        }
    }

    /// Set a settings block.
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

impl PartDefinition {
    /// Create an empty part definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: SettingsMap::new(),
            fields: Vec::new(),
        }
    }

    /// Set a settings block.
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Add a field.
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl FieldDefinition {
    /// Create a field with no settings.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            settings: SettingsMap::new(),
        }
    }

    /// Set a settings block.
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}
