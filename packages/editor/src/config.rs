use crate::EditorError;
use serde::{Deserialize, Serialize};
use snaptree_dom::AddressSchema;
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "snaptree.config.json";

/// Default number of history slots, baseline included
pub const DEFAULT_CAPACITY: usize = 300;

/// Per-document history settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Slot count, including the baseline at slot 0
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Source tag active when the stack is created
    #[serde(default)]
    pub default_source: String,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_source: String::new(),
        }
    }
}

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    #[serde(default)]
    pub history: HistoryConfig,

    /// Addressing rules of the primary document
    #[serde(default = "AddressSchema::project")]
    pub primary_schema: AddressSchema,

    /// Addressing rules of the metadata document
    #[serde(default = "AddressSchema::project_metadata")]
    pub metadata_schema: AddressSchema,
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        Ok(config)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            primary_schema: AddressSchema::project(),
            metadata_schema: AddressSchema::project_metadata(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "history": { "capacity": 50, "defaultSource": "diagram" },
            "primarySchema": {
                "root": "doc",
                "singular": ["body"],
                "keyed": ["item"]
            }
        }"#;

        let config = EditorConfig::from_json(json).unwrap();
        assert_eq!(config.history.capacity, 50);
        assert_eq!(config.history.default_source, "diagram");
        assert_eq!(config.primary_schema.root, "doc");
        assert_eq!(config.metadata_schema, AddressSchema::project_metadata());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EditorConfig::from_json("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.history.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = std::env::temp_dir().join("snaptree-config-missing");
        let config = EditorConfig::load(&dir).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = EditorConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
    }
}
