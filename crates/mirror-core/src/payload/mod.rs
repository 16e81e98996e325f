//! Configuration payload codecs
//!
//! The shape of an entity's configuration payload is defined by its
//! subtype, so the serializer never inspects it field by field. A registry
//! maps subtype aliases to codecs; subtypes without a registered codec use
//! the opaque codec, which stores canonical JSON text.

mod diff;

pub use diff::config_changes;

use crate::error::{Error, Result};
use crate::model::ConfigBlock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Encoder/decoder for one family of configuration payloads
pub trait PayloadCodec: Send + Sync {
    /// Codec name, used in diagnostics
    fn name(&self) -> &str;

    fn encode(&self, payload: &Value) -> Result<ConfigBlock>;

    /// Decode a stored block. Codecs accept both encodings so a document
    /// written before a codec was registered still imports.
    fn decode(&self, block: &ConfigBlock) -> Result<Value> {
        match block {
            ConfigBlock::Opaque(text) => Ok(serde_json::from_str(text)?),
            ConfigBlock::Structured(value) => Ok(value.clone()),
        }
    }
}

/// Stores the payload as canonical JSON text
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueJsonCodec;

impl PayloadCodec for OpaqueJsonCodec {
    fn name(&self) -> &str {
        "opaque"
    }

    fn encode(&self, payload: &Value) -> Result<ConfigBlock> {
        Ok(ConfigBlock::Opaque(canonical(payload)))
    }
}

/// Stores the payload as a nested document
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredCodec;

impl PayloadCodec for StructuredCodec {
    fn name(&self) -> &str {
        "structured"
    }

    fn encode(&self, payload: &Value) -> Result<ConfigBlock> {
        Ok(ConfigBlock::Structured(payload.clone()))
    }
}

/// Canonical compact JSON: object keys sorted, no whitespace.
///
/// Keys are sorted here rather than relying on the map type, which keeps
/// insertion order when serde_json's `preserve_order` feature is enabled.
pub fn canonical(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Subtype alias to codec mapping
#[derive(Clone)]
pub struct ConfigPayloadRegistry {
    codecs: BTreeMap<String, Arc<dyn PayloadCodec>>,
    default: Arc<dyn PayloadCodec>,
}

impl Default for ConfigPayloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigPayloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigPayloadRegistry")
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .field("default", &self.default.name())
            .finish()
    }
}

impl ConfigPayloadRegistry {
    /// A registry where every subtype uses the opaque codec.
    pub fn new() -> Self {
        Self {
            codecs: BTreeMap::new(),
            default: Arc::new(OpaqueJsonCodec),
        }
    }

    /// Register a codec for a subtype alias (case-insensitive).
    pub fn register(&mut self, subtype: &str, codec: Arc<dyn PayloadCodec>) {
        self.codecs.insert(subtype.to_lowercase(), codec);
    }

    pub fn with_codec(mut self, subtype: &str, codec: Arc<dyn PayloadCodec>) -> Self {
        self.register(subtype, codec);
        self
    }

    /// The codec for a subtype, falling back to the default.
    pub fn codec_for(&self, subtype: &str) -> &dyn PayloadCodec {
        self.codecs
            .get(&subtype.to_lowercase())
            .unwrap_or(&self.default)
            .as_ref()
    }

    pub fn encode(&self, subtype: &str, payload: &Value) -> Result<ConfigBlock> {
        self.codec_for(subtype).encode(payload)
    }

    pub fn decode(&self, subtype: &str, block: &ConfigBlock) -> Result<Value> {
        let codec = self.codec_for(subtype);
        codec.decode(block).map_err(|e| match e {
            Error::Json(inner) => Error::Validation(format!(
                "{} config payload for `{}` is not valid JSON: {}",
                codec.name(),
                subtype,
                inner
            )),
            other => other,
        })
    }

    /// Structural equality via canonical form.
    pub fn payloads_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => canonical(a) == canonical(b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorClass;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn default_codec_writes_canonical_json() {
        let registry = ConfigPayloadRegistry::new();
        let block = registry
            .encode("Editor.Unknown", &json!({"b": 1, "a": [true, null]}))
            .unwrap();
        assert_eq!(block, ConfigBlock::Opaque(r#"{"a":[true,null],"b":1}"#.into()));
    }

    #[test]
    fn registered_codec_is_case_insensitive() {
        let registry =
            ConfigPayloadRegistry::new().with_codec("Editor.List", Arc::new(StructuredCodec));
        assert_eq!(registry.codec_for("editor.list").name(), "structured");
        assert_eq!(registry.codec_for("Editor.Other").name(), "opaque");
    }

    #[test]
    fn decode_accepts_either_encoding() {
        let registry = ConfigPayloadRegistry::new();
        let payload = json!({"items": ["red", "green"]});

        let opaque = registry
            .decode("x", &ConfigBlock::Opaque(canonical(&payload)))
            .unwrap();
        let structured = registry
            .decode("x", &ConfigBlock::Structured(payload.clone()))
            .unwrap();

        assert_eq!(opaque, payload);
        assert_eq!(structured, payload);
    }

    #[test]
    fn malformed_opaque_payload_is_a_validation_failure() {
        let registry = ConfigPayloadRegistry::new();
        let err = registry
            .decode("Editor.Text", &ConfigBlock::Opaque("{not json".into()))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::ValidationFailure);
    }

    #[test]
    fn canonical_form_sorts_nested_keys() {
        let mut inner = serde_json::Map::new();
        inner.insert("zeta".into(), json!(1));
        inner.insert("alpha".into(), json!([{"y": 1, "x": 2}]));
        let mut outer = serde_json::Map::new();
        outer.insert("b".into(), Value::Object(inner));
        outer.insert("a".into(), json!(null));

        assert_eq!(
            canonical(&Value::Object(outer)),
            r#"{"a":null,"b":{"alpha":[{"x":2,"y":1}],"zeta":1}}"#
        );
    }

    #[test]
    fn equality_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":{"b":2,"a":1}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":{"a":1,"b":2},"x":1}"#).unwrap();
        assert!(ConfigPayloadRegistry::payloads_equal(Some(&a), Some(&b)));
        assert!(!ConfigPayloadRegistry::payloads_equal(Some(&a), None));
    }
}
