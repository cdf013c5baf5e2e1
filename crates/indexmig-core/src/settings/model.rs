//! Typed index settings, legacy and unified.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Index settings as written by releases before the module rename.
///
/// `Analyzed`, `Tokenized` and `Template` are deprecated and never survive a
/// migration. The deprecated string/bool fields are kept as raw values so an
/// odd historical encoding of a key that is about to be dropped cannot fail
/// the migration. Unrecognised properties are carried forward untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyIndexSettings {
    /// Whether the field is part of the index.
    #[serde(rename = "Included", default, skip_serializing_if = "Option::is_none")]
    pub included: Option<bool>,
    /// Whether the field was run through an analyzer.
    #[serde(rename = "Analyzed", default, skip_serializing_if = "Option::is_none")]
    pub analyzed: Option<bool>,
    /// Deprecated tokenization flag.
    #[serde(rename = "Tokenized", default, skip_serializing_if = "Option::is_none")]
    pub tokenized: Option<Value>,
    /// Deprecated liquid template.
    #[serde(rename = "Template", default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Any other properties of the block.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LegacyIndexSettings {
    /// Parse a legacy settings block stored under `key`.
    ///
    /// An explicit `null` for `Included` or `Analyzed` reads as absent.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, Error> {
        if !value.is_object() {
            return Err(Error::malformed(key, "expected a JSON object"));
        }
        serde_json::from_value(value.clone()).map_err(|e| Error::malformed(key, e.to_string()))
    }

    /// Derive the keyword flag from `Included` and `Analyzed`.
    ///
    /// Returns `None` when `Included` is absent: the legacy data is too
    /// incomplete to say anything.
    pub fn keyword(&self) -> Option<bool> {
        let included = self.included?;
        Some(match self.analyzed {
            Some(analyzed) => included && !analyzed,
            None => included,
        })
    }
}

/// Index settings in the unified shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedIndexSettings {
    /// Index the value as one exact term instead of analyzed text.
    /// Absent on the wire means `false`.
    #[serde(rename = "Keyword", default, skip_serializing_if = "is_false")]
    pub keyword: bool,
    /// Properties carried over from the legacy block (notably `Included`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl UnifiedIndexSettings {
    /// Convert legacy settings, dropping the deprecated properties.
    pub fn from_legacy(legacy: LegacyIndexSettings) -> Self {
        let keyword = legacy.keyword() == Some(true);
        let LegacyIndexSettings {
            included,
            extra: mut carried,
            ..
        } = legacy;

        carried.remove("Keyword");

        let mut extra = Map::new();
        if let Some(included) = included {
            extra.insert("Included".to_string(), Value::Bool(included));
        }
        extra.extend(carried);

        Self { keyword, extra }
    }

    /// Serialize into a fresh JSON object.
    pub fn to_value(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy(value: Value) -> LegacyIndexSettings {
        LegacyIndexSettings::from_value("ContentIndexSettings", &value).unwrap()
    }

    #[test]
    fn test_keyword_derivation() {
        assert_eq!(legacy(json!({"Included": true, "Analyzed": false})).keyword(), Some(true));
        assert_eq!(legacy(json!({"Included": true, "Analyzed": true})).keyword(), Some(false));
        assert_eq!(legacy(json!({"Included": false, "Analyzed": false})).keyword(), Some(false));
        assert_eq!(legacy(json!({"Included": true})).keyword(), Some(true));
        assert_eq!(legacy(json!({"Analyzed": false})).keyword(), None);
    }

    #[test]
    fn test_null_reads_as_absent() {
        let settings = legacy(json!({"Included": true, "Analyzed": null}));
        assert_eq!(settings.analyzed, None);
        assert_eq!(settings.keyword(), Some(true));

        let settings = legacy(json!({"Included": null, "Analyzed": false}));
        assert_eq!(settings.keyword(), None);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = LegacyIndexSettings::from_value("ContentIndexSettings", &json!(true)).unwrap_err();
        assert!(matches!(err, Error::MalformedSettings { .. }));
    }

    #[test]
    fn test_rejects_non_boolean_flag() {
        let err =
            LegacyIndexSettings::from_value("ContentIndexSettings", &json!({"Included": "yes"}))
                .unwrap_err();
        assert!(err.to_string().contains("ContentIndexSettings"));
    }

    #[test]
    fn test_from_legacy_drops_deprecated_keys() {
        let unified = UnifiedIndexSettings::from_legacy(legacy(json!({
            "Included": true,
            "Analyzed": false,
            "Tokenized": true,
            "Template": "{{ Model.Value }}",
            "Stored": true
        })));

        assert_eq!(
            unified.to_value().unwrap(),
            json!({"Included": true, "Keyword": true, "Stored": true})
        );
    }

    #[test]
    fn test_keyword_false_is_omitted() {
        let unified =
            UnifiedIndexSettings::from_legacy(legacy(json!({"Included": true, "Analyzed": true})));
        assert_eq!(unified.to_value().unwrap(), json!({"Included": true}));
    }

    #[test]
    fn test_stale_keyword_is_rederived() {
        let unified = UnifiedIndexSettings::from_legacy(legacy(json!({
            "Included": true,
            "Analyzed": true,
            "Keyword": true
        })));
        assert!(!unified.keyword);
        assert_eq!(unified.to_value().unwrap(), json!({"Included": true}));

        let unified =
            UnifiedIndexSettings::from_legacy(legacy(json!({"Included": false, "Keyword": false})));
        assert_eq!(unified.to_value().unwrap(), json!({"Included": false}));
    }
}
