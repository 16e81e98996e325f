//! Data type adapter

use super::EntityAdapter;
use crate::error::{Error, Result};
use crate::host::HostService;
use crate::model::{Entity, EntityKind};
use std::sync::Arc;
use uuid::Uuid;

/// Scalar field holding the storage type hint
pub const DATABASE_TYPE_FIELD: &str = "DatabaseType";

/// Storage type given to newly created data types
pub const DEFAULT_DATABASE_TYPE: &str = "Nvarchar";

/// Data types: bound to an editor subtype, grouped in containers, carrying
/// an editor-defined configuration payload.
pub struct DataTypeAdapter {
    host: Arc<dyn HostService>,
}

impl DataTypeAdapter {
    pub fn new(host: Arc<dyn HostService>) -> Self {
        Self { host }
    }
}

impl EntityAdapter for DataTypeAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::DataType
    }

    fn host(&self) -> &dyn HostService {
        self.host.as_ref()
    }

    fn create(&self, alias: &str, parent: Option<Uuid>, subtype: &str) -> Result<Entity> {
        if !self.resolve_subtype(subtype) {
            return Err(Error::NotFound(format!(
                "(Missing package?) data editor `{}` is not installed",
                subtype
            )));
        }
        if let Some(parent) = parent {
            if self.host.container(self.kind(), parent).is_none() {
                return Err(Error::NotFound(format!("container {}", parent)));
            }
        }

        let mut entity = Entity::new(self.kind(), Uuid::new_v4(), alias)
            .with_subtype(subtype)
            .with_field(DATABASE_TYPE_FIELD, DEFAULT_DATABASE_TYPE);
        entity.parent = parent;
        Ok(entity)
    }

    fn resolve_subtype(&self, alias: &str) -> bool {
        !alias.is_empty() && self.host.has_subtype(self.kind(), alias)
    }

    fn supports_config(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::InMemoryHost;
    use crate::ErrorClass;

    fn adapter() -> (Arc<InMemoryHost>, DataTypeAdapter) {
        let host = Arc::new(InMemoryHost::new());
        host.register_subtype(EntityKind::DataType, "Editor.Text");
        (host.clone(), DataTypeAdapter::new(host))
    }

    #[test]
    fn create_binds_subtype_and_defaults() {
        let (_host, adapter) = adapter();
        let entity = adapter.create("Text", None, "Editor.Text").unwrap();

        assert_eq!(entity.subtype, "Editor.Text");
        assert_eq!(entity.fields[DATABASE_TYPE_FIELD], DEFAULT_DATABASE_TYPE);
        assert!(entity.is_new());
    }

    #[test]
    fn create_with_unknown_editor_is_not_found() {
        let (_host, adapter) = adapter();
        let err = adapter.create("Colour", None, "Editor.Colour").unwrap_err();

        assert_eq!(err.class(), ErrorClass::NotFound);
        assert!(err.to_string().contains("Missing package"));
        assert!(err.to_string().contains("Editor.Colour"));
    }

    #[test]
    fn save_is_a_no_op_for_clean_entities() {
        let (host, adapter) = adapter();
        let mut entity = adapter.create("Text", None, "Editor.Text").unwrap();

        assert!(adapter.save(&mut entity).unwrap());
        assert!(!adapter.save(&mut entity).unwrap());
        assert_eq!(host.save_count(), 1);
    }

    #[test]
    fn delete_container_through_adapter() {
        let (host, adapter) = adapter();
        let folder = crate::host::ContainerStore::create_container(
            host.as_ref(),
            EntityKind::DataType,
            None,
            "Empty",
            None,
        )
        .unwrap();

        adapter.delete_container(folder.key).unwrap();
        assert!(host.containers(EntityKind::DataType).is_empty());
    }
}
