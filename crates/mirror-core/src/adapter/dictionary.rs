//! Dictionary item adapter

use super::EntityAdapter;
use crate::error::{Error, Result};
use crate::host::HostService;
use crate::model::{Entity, EntityKind};
use std::sync::Arc;
use uuid::Uuid;

/// Dictionary items: named by their item key, nested under other items,
/// with one scalar field per translation culture.
pub struct DictionaryAdapter {
    host: Arc<dyn HostService>,
}

impl DictionaryAdapter {
    pub fn new(host: Arc<dyn HostService>) -> Self {
        Self { host }
    }
}

impl EntityAdapter for DictionaryAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::DictionaryItem
    }

    fn host(&self) -> &dyn HostService {
        self.host.as_ref()
    }

    fn create(&self, alias: &str, parent: Option<Uuid>, subtype: &str) -> Result<Entity> {
        if !self.resolve_subtype(subtype) {
            return Err(Error::TypeMismatch(format!(
                "dictionary items have no subtype, got `{}`",
                subtype
            )));
        }
        if let Some(parent) = parent {
            if self.find_by_key(parent).is_none() {
                return Err(Error::NotFound(format!("parent dictionary item {}", parent)));
            }
        }

        let mut entity = Entity::new(self.kind(), Uuid::new_v4(), alias);
        entity.parent = parent;
        Ok(entity)
    }

    fn resolve_subtype(&self, alias: &str) -> bool {
        alias.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::InMemoryHost;
    use crate::ErrorClass;

    #[test]
    fn create_under_missing_parent_fails() {
        let host = Arc::new(InMemoryHost::new());
        let adapter = DictionaryAdapter::new(host);

        let err = adapter
            .create("Greeting", Some(Uuid::new_v4()), "")
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn find_by_alias_is_case_insensitive() {
        let host = Arc::new(InMemoryHost::new());
        let adapter = DictionaryAdapter::new(host);
        let mut entity = adapter.create("Greeting", None, "").unwrap();
        adapter.save(&mut entity).unwrap();

        let found = adapter.find_by_alias("greeting").unwrap();
        assert_eq!(found.key, entity.key);
    }

    #[test]
    fn has_no_containers() {
        let host = Arc::new(InMemoryHost::new());
        let adapter = DictionaryAdapter::new(host);

        assert!(adapter.child_containers(None).is_empty());
        let err = adapter.delete_container(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::TypeMismatch);
    }
}
