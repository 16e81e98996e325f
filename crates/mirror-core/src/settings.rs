//! Handler and sync settings
//!
//! Each handler reads a flat key-value option map. Keys are matched
//! case-insensitively and bool-like values accept `true`/`false` in any case.
//! The whole set lives in one settings document next to the mirror folder.

use crate::error::Result;
use mirror_fs::{DocumentStore, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default settings file name
pub const SETTINGS_FILE: &str = "mirror.toml";

/// Recognised handler option keys
pub mod keys {
    /// Never overwrite existing entities on import
    pub const ONE_WAY: &str = "OneWay";
    /// Subtype aliases whose config payload is never imported
    pub const NO_CONFIG_EDITORS: &str = "NoConfigEditors";
    /// Entity names whose config payload is never imported
    pub const NO_CONFIG_NAMES: &str = "NoConfigNames";
    /// Write every file directly in the handler folder
    pub const USE_FLAT_STRUCTURE: &str = "UseFlatStructure";
    /// Name files by key instead of by name
    pub const GUID_NAMES: &str = "GuidNames";
}

fn default_true() -> bool {
    true
}

/// Option map for one handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: BTreeMap::new(),
        }
    }
}

impl HandlerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Raw value for a key, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Bool-like value, or `default` when the key is absent.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Delimited list value, split on `,` and `;`, trimmed, empties dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_one_way(&self) -> bool {
        self.get_bool(keys::ONE_WAY, false)
    }

    pub fn use_flat_structure(&self) -> bool {
        self.get_bool(keys::USE_FLAT_STRUCTURE, false)
    }

    pub fn guid_names(&self) -> bool {
        self.get_bool(keys::GUID_NAMES, false)
    }
}

fn default_root_folder() -> String {
    "mirror".to_string()
}

fn default_extension() -> String {
    "yaml".to_string()
}

/// Settings for a whole mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Mirror folder, relative to the base directory
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
    /// Document format of mirror files, by extension
    #[serde(default = "default_extension")]
    pub file_extension: String,
    /// Per-handler options keyed by handler alias
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerSettings>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            root_folder: default_root_folder(),
            file_extension: default_extension(),
            handlers: BTreeMap::new(),
        }
    }
}

impl SyncSettings {
    /// Load settings; a missing file yields the defaults.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        if !path.is_file() {
            tracing::debug!(path = %path, "No settings file, using defaults");
            return Ok(Self::default());
        }
        Ok(DocumentStore::new().load(path)?)
    }

    /// Save settings, format chosen by extension.
    pub fn save(&self, path: &NormalizedPath) -> Result<()> {
        DocumentStore::new().save(path, self)?;
        Ok(())
    }

    /// Options for a handler; absent handlers get enabled defaults.
    pub fn handler(&self, alias: &str) -> HandlerSettings {
        self.handlers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(alias))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    pub fn with_handler(mut self, alias: impl Into<String>, settings: HandlerSettings) -> Self {
        self.handlers.insert(alias.into(), settings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case(" True ", true)]
    #[case("false", false)]
    #[case("yes", false)]
    fn one_way_is_bool_like(#[case] value: &str, #[case] expected: bool) {
        let settings = HandlerSettings::new().with_setting("oneway", value);
        assert_eq!(settings.is_one_way(), expected);
    }

    #[test]
    fn lists_split_on_commas_and_semicolons() {
        let settings = HandlerSettings::new()
            .with_setting(keys::NO_CONFIG_EDITORS, "Editor.A, Editor.B;;Editor.C ");
        assert_eq!(
            settings.get_list(keys::NO_CONFIG_EDITORS),
            vec!["Editor.A", "Editor.B", "Editor.C"]
        );
        assert!(settings.get_list(keys::NO_CONFIG_NAMES).is_empty());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let path = NormalizedPath::new(temp.path()).join(SETTINGS_FILE);

        let settings = SyncSettings::load(&path).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(settings.handler("dataTypeHandler").enabled);
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let temp = TempDir::new().unwrap();
        let path = NormalizedPath::new(temp.path()).join(SETTINGS_FILE);
        let settings = SyncSettings::default().with_handler(
            "dictionaryHandler",
            HandlerSettings::new().with_setting(keys::ONE_WAY, "true"),
        );

        settings.save(&path).unwrap();
        let loaded = SyncSettings::load(&path).unwrap();

        assert_eq!(loaded, settings);
        assert!(loaded.handler("DictionaryHandler").is_one_way());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = NormalizedPath::new(temp.path()).join(SETTINGS_FILE);
        std::fs::write(
            path.to_native(),
            "[handlers.dataTypeHandler]\nenabled = false\n",
        )
        .unwrap();

        let settings = SyncSettings::load(&path).unwrap();
        assert_eq!(settings.root_folder, "mirror");
        assert!(!settings.handler("dataTypeHandler").enabled);
    }
}
