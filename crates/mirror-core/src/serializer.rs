//! Entity to document conversion and field-level diffing
//!
//! [`EntitySerializer::deserialize`] never persists anything. It locates or
//! creates the target through the adapter, applies every differing field to
//! an in-memory copy and returns that copy with one [`ChangeRecord`] per
//! difference. Committing is the orchestrator's decision.

use crate::adapter::EntityAdapter;
use crate::error::{Error, Result};
use crate::model::{
    ChangeKind, ChangeRecord, Entity, FORMAT_VERSION, InfoBlock, NodeAction, ParentRef,
    SerializedNode,
};
use crate::payload::{ConfigPayloadRegistry, config_changes};
use crate::resolver::ContainerResolver;
use crate::settings::{HandlerSettings, keys};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Per-call deserialization options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Subtype aliases whose config payload is left untouched
    pub no_config_editors: Vec<String>,
    /// Entity names whose config payload is left untouched
    pub no_config_names: Vec<String>,
    /// Resolve placement without creating containers
    pub dry_run: bool,
    /// Keys owned by other documents of the same batch; alias lookups
    /// never match these entities
    pub claimed_keys: BTreeSet<Uuid>,
}

impl SerializerOptions {
    pub fn from_settings(settings: &HandlerSettings) -> Self {
        Self {
            no_config_editors: settings.get_list(keys::NO_CONFIG_EDITORS),
            no_config_names: settings.get_list(keys::NO_CONFIG_NAMES),
            ..Self::default()
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_claimed_keys(mut self, keys: BTreeSet<Uuid>) -> Self {
        self.claimed_keys = keys;
        self
    }

    /// True when the entity's config payload must not be deserialized.
    pub fn skips_config(&self, entity: &Entity) -> bool {
        let listed = |list: &[String], value: &str| {
            list.iter().any(|item| item.eq_ignore_ascii_case(value))
        };
        listed(&self.no_config_editors, &entity.subtype)
            || listed(&self.no_config_names, &entity.name)
    }
}

/// Outcome of [`EntitySerializer::deserialize`]
#[derive(Debug, Clone)]
pub struct Deserialized {
    /// The mutated, unsaved entity
    pub entity: Entity,
    pub changes: Vec<ChangeRecord>,
    /// True when the entity did not exist before this call
    pub created: bool,
    /// Reference names whose targets do not exist yet
    pub deferred: Vec<String>,
}

/// Where the document says the entity belongs
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    Root,
    Existing(Uuid),
    /// Dry run only: the container path does not exist yet
    Missing(String),
}

impl Placement {
    fn key(&self) -> Option<Uuid> {
        match self {
            Self::Existing(key) => Some(*key),
            _ => None,
        }
    }
}

/// Converts entities to serialized nodes and back
pub struct EntitySerializer {
    adapter: Arc<dyn EntityAdapter>,
    resolver: Arc<ContainerResolver>,
    registry: Arc<ConfigPayloadRegistry>,
}

impl fmt::Debug for EntitySerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySerializer")
            .field("kind", &self.adapter.kind())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl EntitySerializer {
    pub fn new(
        adapter: Arc<dyn EntityAdapter>,
        resolver: Arc<ContainerResolver>,
        registry: Arc<ConfigPayloadRegistry>,
    ) -> Self {
        Self {
            adapter,
            resolver,
            registry,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn EntityAdapter> {
        &self.adapter
    }

    pub fn resolver(&self) -> &Arc<ContainerResolver> {
        &self.resolver
    }

    /// Convert an entity into its document form.
    pub fn serialize(&self, entity: &Entity) -> Result<SerializedNode> {
        let kind = self.adapter.kind();
        if entity.kind != kind {
            return Err(Error::TypeMismatch(format!(
                "{} handler cannot serialize {} `{}`",
                kind, entity.kind, entity.name
            )));
        }

        let mut info = InfoBlock {
            name: entity.name.clone(),
            fields: entity.fields.clone(),
            references: entity.references.clone(),
            folder: None,
            parent: None,
        };

        if let Some(parent) = entity.parent {
            if kind.uses_containers() {
                info.folder = Some(self.resolver.folder_ref(kind, parent)?);
            } else {
                let alias = self
                    .adapter
                    .find_by_key(parent)
                    .map(|p| self.adapter.item_alias(&p))
                    .unwrap_or_default();
                info.parent = Some(ParentRef { key: parent, alias });
            }
        }

        let config = match (&entity.configuration, self.adapter.supports_config()) {
            (Some(payload), true) => Some(self.registry.encode(&entity.subtype, payload)?),
            _ => None,
        };

        Ok(SerializedNode {
            kind,
            key: entity.key,
            alias: self.adapter.item_alias(entity),
            subtype: entity.subtype.clone(),
            level: entity.level,
            version: FORMAT_VERSION.to_string(),
            action: NodeAction::Update,
            info,
            config,
        })
    }

    /// Apply a document to its target entity without persisting.
    pub fn deserialize(
        &self,
        node: &SerializedNode,
        options: &SerializerOptions,
    ) -> Result<Deserialized> {
        self.check_node(node)?;
        let name = node_name(node);

        let found = self.find_with(node, &options.claimed_keys);
        let (mut entity, created, mut placement) = match found {
            Some(existing) => (existing, false, None),
            None => {
                let placement = self.resolve_placement(node, options.dry_run)?;
                tracing::debug!(kind = %node.kind, name, "Creating entity");
                let entity = self.adapter.create(name, placement.key(), &node.subtype)?;
                (entity, true, Some(placement))
            }
        };

        let mut changes = Vec::new();
        // New entities only report the values they receive
        let mut record = |field: &str, old: &dyn fmt::Display, new: &dyn fmt::Display| {
            changes.push(if created {
                ChangeRecord::create(field, new)
            } else {
                ChangeRecord::update(field, old, new)
            });
        };

        if entity.name != name {
            record("Name", &entity.name, &name);
            entity.name = name.to_string();
        }
        if entity.key != node.key {
            record("Key", &entity.key, &node.key);
            entity.key = node.key;
        }

        if entity.subtype != node.subtype {
            if self.adapter.resolve_subtype(&node.subtype) {
                record("Subtype", &entity.subtype, &node.subtype);
                entity.subtype = node.subtype.clone();
            } else {
                tracing::warn!(
                    name = %entity.name,
                    current = %entity.subtype,
                    requested = %node.subtype,
                    "Subtype is not available on this host, keeping the current one"
                );
            }
        }

        for (field, value) in &node.info.fields {
            match entity.fields.get(field) {
                Some(current) if current == value => {}
                Some(current) => {
                    record(field, current, value);
                    entity.fields.insert(field.clone(), value.clone());
                }
                None => {
                    record(field, &"", value);
                    entity.fields.insert(field.clone(), value.clone());
                }
            }
        }
        let removed: Vec<String> = entity
            .fields
            .keys()
            .filter(|k| !node.info.fields.contains_key(*k))
            .cloned()
            .collect();

        for field in removed {
            if let Some(old) = entity.fields.remove(&field) {
                changes.push(ChangeRecord::removed(field, old));
            }
        }

        let deferred = self.apply_references(node, &mut entity, &mut changes);

        let placement = match placement.take() {
            Some(placement) => placement,
            None => self.resolve_placement(node, options.dry_run)?,
        };
        self.apply_placement(&placement, &mut entity, &mut changes)?;

        // A document without a Config block leaves the payload alone
        match (&node.config, self.adapter.supports_config()) {
            (Some(_), true) if options.skips_config(&entity) => {
                tracing::debug!(
                    name = %entity.name,
                    subtype = %entity.subtype,
                    "Config excluded by settings"
                );
            }
            (Some(block), true) => {
                let incoming = self.registry.decode(&entity.subtype, block)?;
                let current = entity.configuration.as_ref();
                if !ConfigPayloadRegistry::payloads_equal(current, Some(&incoming)) {
                    changes.extend(config_changes(current, Some(&incoming)));
                    entity.configuration = Some(incoming);
                }
            }
            _ => {}
        }

        if !changes.is_empty() {
            entity.mark_dirty();
        }
        for change in &changes {
            tracing::debug!(name = %entity.name, %change, "Field difference");
        }

        Ok(Deserialized {
            entity,
            changes,
            created,
            deferred,
        })
    }

    /// Bind references whose targets now exist.
    pub fn second_pass(&self, node: &SerializedNode, entity: &mut Entity) -> Vec<ChangeRecord> {
        let mut changes = Vec::new();
        for (name, target) in &node.info.references {
            if entity.references.get(name) == Some(target) {
                continue;
            }
            if self.adapter.find_by_key(*target).is_none() {
                tracing::warn!(
                    name = %entity.name,
                    reference = %name,
                    %target,
                    "Reference target still missing"
                );
                continue;
            }
            match entity.references.insert(name.clone(), *target) {
                Some(old) => changes.push(ChangeRecord::update(name.as_str(), old, target)),
                None => changes.push(ChangeRecord::create(name.as_str(), target)),
            }
        }
        if !changes.is_empty() {
            entity.mark_dirty();
        }
        changes
    }

    /// True when the document already describes the entity exactly.
    pub fn is_current(&self, node: &SerializedNode, entity: &Entity) -> Result<bool> {
        let current = self.serialize(entity)?;

        let same_info = current.key == node.key
            && current.alias == node.alias
            && current.subtype == node.subtype
            && current.info.name == node_name(node)
            && current.info.fields == node.info.fields
            && current.info.references == node.info.references
            && current.info.folder.as_ref().map(|f| f.segments())
                == node.info.folder.as_ref().map(|f| f.segments())
            && current.info.parent.as_ref().map(|p| p.key)
                == node.info.parent.as_ref().map(|p| p.key);
        if !same_info {
            return Ok(false);
        }

        let (Some(block), true) = (&node.config, self.adapter.supports_config()) else {
            return Ok(true);
        };
        let incoming = self.registry.decode(&node.subtype, block)?;
        Ok(ConfigPayloadRegistry::payloads_equal(
            entity.configuration.as_ref(),
            Some(&incoming),
        ))
    }

    /// The existing entity a document targets, by key then alias.
    pub fn find(&self, node: &SerializedNode) -> Option<Entity> {
        self.find_with(node, &BTreeSet::new())
    }

    /// Like [`find`](Self::find), but an alias match whose key is in
    /// `claimed` is ignored: that entity has a document of its own.
    pub fn find_with(&self, node: &SerializedNode, claimed: &BTreeSet<Uuid>) -> Option<Entity> {
        self.adapter.find_by_key(node.key).or_else(|| {
            self.adapter
                .find_by_alias(&node.alias)
                .filter(|entity| !claimed.contains(&entity.key))
        })
    }

    fn check_node(&self, node: &SerializedNode) -> Result<()> {
        let kind = self.adapter.kind();
        if node.kind != kind {
            return Err(Error::TypeMismatch(format!(
                "expected a {} document, found {}",
                kind, node.kind
            )));
        }
        if node.is_tombstone() {
            return Err(Error::Validation(format!(
                "`{}` is a deletion record and has no fields to apply",
                node.alias
            )));
        }
        if node_name(node).trim().is_empty() {
            return Err(Error::Validation(format!("document {} has no name or alias", node.key)));
        }
        Ok(())
    }

    fn apply_references(
        &self,
        node: &SerializedNode,
        entity: &mut Entity,
        changes: &mut Vec<ChangeRecord>,
    ) -> Vec<String> {
        let mut deferred = Vec::new();
        for (name, target) in &node.info.references {
            if entity.references.get(name) == Some(target) {
                continue;
            }
            let resolvable = *target == entity.key || self.adapter.find_by_key(*target).is_some();
            if !resolvable {
                tracing::debug!(
                    name = %entity.name,
                    reference = %name,
                    %target,
                    "Reference deferred to second pass"
                );
                deferred.push(name.clone());
                continue;
            }
            match entity.references.insert(name.clone(), *target) {
                Some(old) => changes.push(ChangeRecord::update(name.as_str(), old, target)),
                None => changes.push(ChangeRecord::create(name.as_str(), target)),
            }
        }

        let stale: Vec<String> = entity
            .references
            .keys()
            .filter(|k| !node.info.references.contains_key(*k))
            .cloned()
            .collect();
        for name in stale {
            if let Some(old) = entity.references.remove(&name) {
                changes.push(ChangeRecord::removed(name, old));
            }
        }
        deferred
    }

    fn resolve_placement(&self, node: &SerializedNode, dry_run: bool) -> Result<Placement> {
        let kind = self.adapter.kind();

        if kind.uses_containers() {
            let Some(folder) = &node.info.folder else {
                return Ok(Placement::Root);
            };
            let segments = folder.segments();
            if segments.is_empty() && folder.key.is_none() {
                return Ok(Placement::Root);
            }
            if dry_run {
                return Ok(match self.resolver.find(kind, &segments, folder.key) {
                    Some(container) => Placement::Existing(container.key),
                    None => Placement::Missing(folder.path.clone()),
                });
            }
            let container = self.resolver.find_or_create(kind, &segments, folder.key)?;
            return Ok(Placement::Existing(container.key));
        }

        let Some(parent) = &node.info.parent else {
            return Ok(Placement::Root);
        };
        let found = self.adapter.find_by_key(parent.key).or_else(|| {
            (!parent.alias.is_empty())
                .then(|| self.adapter.find_by_alias(&parent.alias))
                .flatten()
        });
        match found {
            Some(entity) => Ok(Placement::Existing(entity.key)),
            None if dry_run => Ok(Placement::Missing(parent.alias.clone())),
            None => Err(Error::NotFound(format!(
                "parent {} `{}` ({})",
                kind, parent.alias, parent.key
            ))),
        }
    }

    fn apply_placement(
        &self,
        placement: &Placement,
        entity: &mut Entity,
        changes: &mut Vec<ChangeRecord>,
    ) -> Result<()> {
        let kind = self.adapter.kind();
        let field = if kind.uses_containers() { "Folder" } else { "Parent" };

        match placement {
            Placement::Missing(path) => {
                changes.push(ChangeRecord::new(
                    ChangeKind::Create,
                    field,
                    self.describe_parent(entity.parent),
                    Some(path.clone()),
                ));
            }
            Placement::Root => {
                if entity.parent.is_some() {
                    changes.push(ChangeRecord::new(
                        ChangeKind::Update,
                        field,
                        self.describe_parent(entity.parent),
                        Some(String::new()),
                    ));
                    entity.parent = None;
                }
            }
            Placement::Existing(target) => {
                if entity.parent == Some(*target) {
                    return Ok(());
                }
                if !kind.uses_containers() {
                    self.check_no_cycle(entity.key, *target)?;
                }
                changes.push(ChangeRecord::new(
                    ChangeKind::Update,
                    field,
                    self.describe_parent(entity.parent),
                    self.describe_parent(Some(*target)),
                ));
                entity.parent = Some(*target);
            }
        }
        Ok(())
    }

    /// Refuse to nest an entity under itself or one of its descendants.
    fn check_no_cycle(&self, key: Uuid, new_parent: Uuid) -> Result<()> {
        let mut current = Some(new_parent);
        let mut steps = 0usize;
        while let Some(ancestor) = current {
            if ancestor == key {
                return Err(Error::Validation(format!(
                    "moving {} under {} would create a cycle",
                    key, new_parent
                )));
            }
            steps += 1;
            if steps > 1024 {
                return Err(Error::Validation(format!(
                    "hierarchy above {} is too deep or cyclic",
                    new_parent
                )));
            }
            current = self.adapter.find_by_key(ancestor).and_then(|e| e.parent);
        }
        Ok(())
    }

    /// Human-readable parent for change records: folder path or item alias.
    fn describe_parent(&self, parent: Option<Uuid>) -> Option<String> {
        let kind = self.adapter.kind();
        let description = match parent {
            None => String::new(),
            Some(key) if kind.uses_containers() => self
                .resolver
                .folder_path(kind, key)
                .map(|path| path.join("/"))
                .unwrap_or_else(|_| key.to_string()),
            Some(key) => self
                .adapter
                .find_by_key(key)
                .map(|e| self.adapter.item_alias(&e))
                .unwrap_or_else(|| key.to_string()),
        };
        Some(description)
    }
}

/// Display name of a node: the info name, falling back to the alias.
fn node_name(node: &SerializedNode) -> &str {
    if node.info.name.is_empty() {
        &node.alias
    } else {
        &node.info.name
    }
}
