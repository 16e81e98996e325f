use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// The kinds of host entity the mirror knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// Data type definitions, grouped in host containers (folders)
    DataType,
    /// Dictionary items, nested under other dictionary items
    DictionaryItem,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataType => "DataType",
            Self::DictionaryItem => "DictionaryItem",
        }
    }

    /// True when the kind's parents are containers rather than other
    /// entities of the same kind.
    pub fn uses_containers(&self) -> bool {
        matches!(self, Self::DataType)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live item owned by the host service layer.
///
/// The mirror only ever holds copies: the host hands them out, the
/// serializer mutates a copy and the adapter hands it back through
/// [`EntityStore::save`](crate::host::EntityStore::save). Equality compares
/// domain fields only; the dirty flag and stored key are bookkeeping.
#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    /// Stable identity across machines
    pub key: Uuid,
    pub name: String,
    /// Parent container (container kinds) or parent entity (nested kinds)
    pub parent: Option<Uuid>,
    /// Depth in the hierarchy, root items are level 1
    pub level: u32,
    /// Subtype alias (editor alias for data types)
    pub subtype: String,
    /// Subtype-specific scalar fields
    pub fields: BTreeMap<String, String>,
    /// Named references to other entities of the same kind
    pub references: BTreeMap<String, Uuid>,
    /// Opaque configuration payload, shape defined by the subtype
    pub configuration: Option<Value>,
    /// Key the host holds this entity under; differs from `key` until a
    /// re-keyed copy is saved
    stored_key: Option<Uuid>,
    dirty: bool,
}

impl Entity {
    /// A new, unsaved entity at the root of the hierarchy.
    pub fn new(kind: EntityKind, key: Uuid, name: impl Into<String>) -> Self {
        Self {
            kind,
            key,
            name: name.into(),
            parent: None,
            level: 1,
            subtype: String::new(),
            fields: BTreeMap::new(),
            references: BTreeMap::new(),
            configuration: None,
            stored_key: None,
            dirty: true,
        }
    }

    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = subtype.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, target: Uuid) -> Self {
        self.references.insert(name.into(), target);
        self
    }

    pub fn with_configuration(mut self, configuration: Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// True when the entity has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True when the host has never stored this entity.
    pub fn is_new(&self) -> bool {
        self.stored_key.is_none()
    }

    /// The key the host stored this entity under, if it was ever saved.
    pub fn stored_key(&self) -> Option<Uuid> {
        self.stored_key
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called by the host once the entity has been stored.
    pub fn mark_saved(&mut self) {
        self.stored_key = Some(self.key);
        self.dirty = false;
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.key == other.key
            && self.name == other.name
            && self.parent == other.parent
            && self.level == other.level
            && self.subtype == other.subtype
            && self.fields == other.fields
            && self.references == other.references
            && self.configuration == other.configuration
    }
}
