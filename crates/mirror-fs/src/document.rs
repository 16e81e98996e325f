//! Format-agnostic structured document loading and saving

use crate::{Error, NormalizedPath, Result, io};
use serde::{Serialize, de::DeserializeOwned};

/// Structured document formats understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Toml,
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Detect format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Human-readable format name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    /// Parse a document from text.
    pub fn parse<T: DeserializeOwned>(&self, content: &str) -> std::result::Result<T, String> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Render a document to text.
    pub fn render<T: Serialize>(&self, value: &T) -> std::result::Result<String, String> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(value)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }
}

/// Format-agnostic document store.
///
/// Detects the format from the file extension and handles
/// serialization/deserialization transparently.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentStore;

impl DocumentStore {
    pub fn new() -> Self {
        Self
    }

    fn format_for(path: &NormalizedPath) -> Result<DocumentFormat> {
        let extension = path.extension().unwrap_or("");
        DocumentFormat::from_extension(extension).ok_or_else(|| Error::UnsupportedFormat {
            extension: extension.to_string(),
        })
    }

    /// Load a document from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn load<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<T> {
        let format = Self::format_for(path)?;
        let content = io::read_text(path)?;
        format.parse(&content).map_err(|message| Error::DocumentParse {
            path: path.to_native(),
            format: format.name().into(),
            message,
        })
    }

    /// Render a document into the text that [`DocumentStore::save`] would write.
    pub fn render<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<String> {
        let format = Self::format_for(path)?;
        format.render(value).map_err(|message| Error::DocumentSerialize {
            path: path.to_native(),
            format: format.name().into(),
            message,
        })
    }

    /// Save a document atomically.
    ///
    /// Returns `true` when the file content changed; an identical document
    /// is not rewritten.
    pub fn save<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<bool> {
        let content = self.render(path, value)?;
        io::write_if_changed(path, content.as_bytes())
    }
}
