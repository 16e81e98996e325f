//! Per-kind entity adapters
//!
//! An adapter is the only place the mirror touches host entities: it looks
//! them up, creates new ones bound to a subtype and hands them back to the
//! host for persistence. One implementation exists per [`EntityKind`].

mod data_type;
mod dictionary;

pub use data_type::{DataTypeAdapter, DATABASE_TYPE_FIELD, DEFAULT_DATABASE_TYPE};
pub use dictionary::DictionaryAdapter;

use crate::error::{Error, Result};
use crate::host::HostService;
use crate::model::{Container, Entity, EntityKind};
use std::sync::Arc;
use uuid::Uuid;

/// Capability interface over one entity kind
pub trait EntityAdapter: Send + Sync {
    /// The kind this adapter manages
    fn kind(&self) -> EntityKind;

    /// The host the adapter delegates to
    fn host(&self) -> &dyn HostService;

    /// Create a new, unsaved entity.
    ///
    /// Fails with [`Error::NotFound`] when `subtype` or `parent` does not
    /// resolve on the host. The returned entity has a fresh key.
    fn create(&self, alias: &str, parent: Option<Uuid>, subtype: &str) -> Result<Entity>;

    /// True when `alias` names a subtype the host can bind entities to.
    fn resolve_subtype(&self, alias: &str) -> bool;

    /// True when entities of this kind carry a configuration payload.
    fn supports_config(&self) -> bool {
        false
    }

    fn find_by_key(&self, key: Uuid) -> Option<Entity> {
        self.host().entity(self.kind(), key)
    }

    fn find_by_alias(&self, alias: &str) -> Option<Entity> {
        self.host().entity_by_alias(self.kind(), alias)
    }

    /// Lookup alias written into serialized nodes.
    fn item_alias(&self, entity: &Entity) -> String {
        entity.name.clone()
    }

    /// Entities directly under `parent`, ordered by name.
    fn children(&self, parent: Option<Uuid>) -> Vec<Entity> {
        self.host().children(self.kind(), parent)
    }

    /// Containers directly under `parent`. Empty for kinds without containers.
    fn child_containers(&self, parent: Option<Uuid>) -> Vec<Container> {
        if self.kind().uses_containers() {
            self.host().child_containers(self.kind(), parent)
        } else {
            Vec::new()
        }
    }

    /// Persist the entity. Returns `false` without touching the host when
    /// the entity has no unsaved changes.
    fn save(&self, entity: &mut Entity) -> Result<bool> {
        if !entity.is_dirty() {
            tracing::trace!(
                kind = %self.kind(),
                name = %entity.name,
                "Save skipped, entity is clean"
            );
            return Ok(false);
        }
        self.host()
            .save(entity)
            .map_err(|e| Error::persistence(format!("{} `{}`", self.kind(), entity.name), e))?;
        Ok(true)
    }

    fn delete(&self, entity: &Entity) -> Result<()> {
        self.host()
            .delete(self.kind(), entity.key)
            .map_err(|e| Error::persistence(format!("{} `{}`", self.kind(), entity.name), e))
    }

    fn delete_container(&self, key: Uuid) -> Result<()> {
        if !self.kind().uses_containers() {
            return Err(Error::TypeMismatch(format!(
                "{} entities are not grouped in containers",
                self.kind()
            )));
        }
        self.host()
            .delete_container(self.kind(), key)
            .map_err(|e| Error::persistence(format!("container {}", key), e))
    }
}

/// Build the adapter for a kind.
pub fn adapter_for(kind: EntityKind, host: Arc<dyn HostService>) -> Arc<dyn EntityAdapter> {
    match kind {
        EntityKind::DataType => Arc::new(DataTypeAdapter::new(host)),
        EntityKind::DictionaryItem => Arc::new(DictionaryAdapter::new(host)),
    }
}
