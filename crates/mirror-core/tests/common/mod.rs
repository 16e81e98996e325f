#![allow(dead_code)]

use mirror_core::host::memory::InMemoryHost;
use mirror_core::host::{ContainerStore, EntityStore};
use mirror_core::{
    Container, Entity, EntityKind, SerializedNode, SyncOrchestrator, SyncService, SyncSettings,
};
use mirror_fs::{DocumentStore, NormalizedPath};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEXT_EDITOR: &str = "Editor.Text";
pub const LIST_EDITOR: &str = "Editor.List";

/// A host with the standard editors registered
pub fn host() -> Arc<InMemoryHost> {
    let host = Arc::new(InMemoryHost::new());
    host.register_subtype(EntityKind::DataType, TEXT_EDITOR);
    host.register_subtype(EntityKind::DataType, LIST_EDITOR);
    host
}

pub struct Fixture {
    pub temp: TempDir,
    pub base: NormalizedPath,
    pub host: Arc<InMemoryHost>,
    pub service: SyncService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(SyncSettings::default())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        let temp = TempDir::new().unwrap();
        let base = NormalizedPath::new(temp.path());
        let host = host();
        let service = SyncService::new(host.clone(), &base, &settings);
        Self {
            temp,
            base,
            host,
            service,
        }
    }

    /// A second host and service sharing this fixture's mirror folder
    pub fn peer(&self, settings: &SyncSettings) -> (Arc<InMemoryHost>, SyncService) {
        let host = host();
        let service = SyncService::new(host.clone(), &self.base, settings);
        (host, service)
    }

    pub fn data_types(&self) -> &SyncOrchestrator {
        self.service.handler(EntityKind::DataType).unwrap()
    }

    pub fn dictionary(&self) -> &SyncOrchestrator {
        self.service.handler(EntityKind::DictionaryItem).unwrap()
    }

    /// A file below the mirror root
    pub fn mirror_file(&self, relative: &str) -> NormalizedPath {
        self.service.root().join(relative)
    }
}

/// Create a chain of containers, returning the leaf.
pub fn containers(host: &InMemoryHost, path: &[&str]) -> Container {
    let mut parent = None;
    let mut leaf = None;
    for name in path {
        let container = host
            .create_container(EntityKind::DataType, parent, name, None)
            .unwrap();
        parent = Some(container.key);
        leaf = Some(container);
    }
    leaf.unwrap()
}

pub fn data_type(host: &InMemoryHost, name: &str, container: Option<&Container>) -> Entity {
    let mut entity = Entity::new(EntityKind::DataType, Uuid::new_v4(), name)
        .with_subtype(LIST_EDITOR)
        .with_field("DatabaseType", "Ntext")
        .with_configuration(json!({"items": ["red", "green"], "multiple": false}));
    entity.parent = container.map(|c| c.key);
    host.save(&mut entity).unwrap();
    entity
}

pub fn dictionary_item(
    host: &InMemoryHost,
    name: &str,
    parent: Option<&Entity>,
    text: &str,
) -> Entity {
    let mut entity =
        Entity::new(EntityKind::DictionaryItem, Uuid::new_v4(), name).with_field("en-US", text);
    entity.parent = parent.map(|p| p.key);
    host.save(&mut entity).unwrap();
    entity
}

pub fn read_node(path: &NormalizedPath) -> SerializedNode {
    DocumentStore::new().load(path).unwrap()
}

pub fn write_node(path: &NormalizedPath, node: &SerializedNode) {
    DocumentStore::new().save(path, node).unwrap();
}
