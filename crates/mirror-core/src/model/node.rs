//! On-disk document representation of one entity

use super::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Document format marker written into every node
pub const FORMAT_VERSION: &str = "1";

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// What importing the node should do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAction {
    #[default]
    Update,
    /// Tombstone: the entity was deleted on the exporting side
    Delete,
}

impl NodeAction {
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update)
    }
}

/// The structured document stored in one mirror file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub kind: EntityKind,
    pub key: Uuid,
    /// Lookup alias used when the key is unknown on the importing side
    pub alias: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    pub level: u32,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "NodeAction::is_update")]
    pub action: NodeAction,
    #[serde(default)]
    pub info: InfoBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigBlock>,
}

impl SerializedNode {
    /// A tombstone recording that the entity was deleted.
    pub fn tombstone(kind: EntityKind, key: Uuid, alias: impl Into<String>, level: u32) -> Self {
        let alias = alias.into();
        Self {
            kind,
            key,
            info: InfoBlock {
                name: alias.clone(),
                ..InfoBlock::default()
            },
            alias,
            subtype: String::new(),
            level,
            version: default_version(),
            action: NodeAction::Delete,
            config: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.action == NodeAction::Delete
    }
}

/// Name, scalar fields and hierarchy placement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoBlock {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Uuid>,
    /// Container placement, container kinds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderRef>,
    /// Parent entity, nested kinds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

/// Reference to the container an entity lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Uuid>,
    /// Container names from the root, `/`-separated
    pub path: String,
}

impl FolderRef {
    /// Non-empty path segments, top-down.
    pub fn segments(&self) -> Vec<String> {
        self.path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Reference to a parent entity of the same kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub key: Uuid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
}

/// Encoded configuration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "value", rename_all = "lowercase")]
pub enum ConfigBlock {
    /// Canonical JSON text
    Opaque(String),
    /// Nested document
    Structured(Value),
}
