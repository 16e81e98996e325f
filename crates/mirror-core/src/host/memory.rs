//! In-memory host service
//!
//! Keeps entities, containers and registered subtypes in maps behind a lock
//! and raises notifications synchronously on the calling thread, the way a
//! real host's event system would. Locks are released before handlers run,
//! so a handler may call back into the host.

use super::{
    ContainerStore, EntityStore, HostError, HostResult, Notification, NotificationEvent,
    NotificationHandler, NotificationSource, SubscriptionHandle,
};
use crate::model::{Container, Entity, EntityKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    entities: BTreeMap<(EntityKind, Uuid), Entity>,
    containers: BTreeMap<(EntityKind, Uuid), Container>,
    subtypes: BTreeSet<(EntityKind, String)>,
    denied_container_names: BTreeSet<String>,
}

impl State {
    fn entity_level(&self, kind: EntityKind, parent: Option<Uuid>) -> HostResult<u32> {
        let Some(parent) = parent else {
            return Ok(1);
        };
        if kind.uses_containers() {
            self.containers
                .get(&(kind, parent))
                .map(|c| c.level + 1)
                .ok_or_else(|| HostError::Missing(format!("container {}", parent)))
        } else {
            self.entities
                .get(&(kind, parent))
                .map(|e| e.level + 1)
                .ok_or_else(|| HostError::Missing(format!("parent {} {}", kind, parent)))
        }
    }

    /// Drop the entry stored under `old` and point children at `new`.
    fn rekey(&mut self, kind: EntityKind, old: Uuid, new: Uuid) {
        self.entities.remove(&(kind, old));
        for child in self
            .entities
            .values_mut()
            .filter(|e| e.kind == kind && e.parent == Some(old))
        {
            child.parent = Some(new);
        }
        tracing::debug!(%kind, %old, %new, "Entity re-keyed");
    }

    fn descendants(&self, kind: EntityKind, key: Uuid) -> Vec<Uuid> {
        let mut found = vec![key];
        let mut index = 0;
        while index < found.len() {
            let current = found[index];
            found.extend(
                self.entities
                    .values()
                    .filter(|e| e.kind == kind && e.parent == Some(current))
                    .map(|e| e.key),
            );
            index += 1;
        }
        found
    }
}

/// Host service backed by in-process maps
#[derive(Default)]
pub struct InMemoryHost {
    state: RwLock<State>,
    subscribers: Mutex<Vec<(SubscriptionHandle, EntityKind, NotificationHandler)>>,
    next_handle: AtomicU64,
    saves: AtomicUsize,
    notifications: AtomicUsize,
}

impl std::fmt::Debug for InMemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHost")
            .field("saves", &self.save_count())
            .field("notifications", &self.notification_count())
            .finish_non_exhaustive()
    }
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(
        &self,
    ) -> MutexGuard<'_, Vec<(SubscriptionHandle, EntityKind, NotificationHandler)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subtype definition (e.g. an installed data editor).
    pub fn register_subtype(&self, kind: EntityKind, alias: impl Into<String>) {
        self.write().subtypes.insert((kind, alias.into()));
    }

    /// Make every future container creation with this name fail.
    pub fn deny_container_name(&self, name: impl Into<String>) {
        self.write().denied_container_names.insert(name.into());
    }

    /// All entities of a kind, ordered by key.
    pub fn entities(&self, kind: EntityKind) -> Vec<Entity> {
        self.read()
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// All containers of a kind, ordered by key.
    pub fn containers(&self, kind: EntityKind) -> Vec<Container> {
        self.read()
            .containers
            .values()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of successful entity saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of notifications raised.
    pub fn notification_count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    /// Raise a notification to every subscriber of its kind.
    pub fn notify(&self, notification: &Notification) {
        let handlers: Vec<NotificationHandler> = self
            .subscribers()
            .iter()
            .filter(|(_, kind, _)| *kind == notification.kind)
            .map(|(_, _, handler)| handler.clone())
            .collect();

        self.notifications.fetch_add(1, Ordering::SeqCst);
        for handler in handlers {
            handler(notification);
        }
    }
}

impl EntityStore for InMemoryHost {
    fn entity(&self, kind: EntityKind, key: Uuid) -> Option<Entity> {
        self.read().entities.get(&(kind, key)).cloned()
    }

    fn entity_by_alias(&self, kind: EntityKind, alias: &str) -> Option<Entity> {
        self.read()
            .entities
            .values()
            .find(|e| e.kind == kind && e.name.eq_ignore_ascii_case(alias))
            .cloned()
    }

    fn children(&self, kind: EntityKind, parent: Option<Uuid>) -> Vec<Entity> {
        let mut children: Vec<Entity> = self
            .read()
            .entities
            .values()
            .filter(|e| e.kind == kind && e.parent == parent)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.key.cmp(&b.key)));
        children
    }

    fn save(&self, entity: &mut Entity) -> HostResult<()> {
        let saved = {
            let mut state = self.write();
            let level = state.entity_level(entity.kind, entity.parent)?;
            let previous = entity.stored_key().filter(|old| *old != entity.key);

            if previous.is_some() && state.entities.contains_key(&(entity.kind, entity.key)) {
                return Err(HostError::Conflict {
                    kind: entity.kind,
                    name: entity.name.clone(),
                });
            }

            // Dictionary item keys are unique across the whole dictionary
            if !entity.kind.uses_containers() {
                let clash = state.entities.values().any(|e| {
                    e.kind == entity.kind
                        && e.key != entity.key
                        && Some(e.key) != previous
                        && e.name.eq_ignore_ascii_case(&entity.name)
                });
                if clash {
                    return Err(HostError::Conflict {
                        kind: entity.kind,
                        name: entity.name.clone(),
                    });
                }
            }

            if let Some(old) = previous {
                state.rekey(entity.kind, old, entity.key);
            }
            entity.level = level;
            entity.mark_saved();
            state
                .entities
                .insert((entity.kind, entity.key), entity.clone());
            entity.clone()
        };

        self.saves.fetch_add(1, Ordering::SeqCst);
        self.notify(&Notification {
            kind: saved.kind,
            event: NotificationEvent::Saved,
            entities: vec![saved],
        });
        Ok(())
    }

    fn delete(&self, kind: EntityKind, key: Uuid) -> HostResult<()> {
        let removed = {
            let mut state = self.write();
            if !state.entities.contains_key(&(kind, key)) {
                return Err(HostError::Missing(format!("{} {}", kind, key)));
            }
            let keys = state.descendants(kind, key);
            keys.iter()
                .filter_map(|k| state.entities.remove(&(kind, *k)))
                .collect::<Vec<_>>()
        };

        self.notify(&Notification {
            kind,
            event: NotificationEvent::Deleted,
            entities: removed,
        });
        Ok(())
    }

    fn has_subtype(&self, kind: EntityKind, alias: &str) -> bool {
        self.read()
            .subtypes
            .iter()
            .any(|(k, a)| *k == kind && a.eq_ignore_ascii_case(alias))
    }
}

impl ContainerStore for InMemoryHost {
    fn container(&self, kind: EntityKind, key: Uuid) -> Option<Container> {
        self.read().containers.get(&(kind, key)).cloned()
    }

    fn child_containers(&self, kind: EntityKind, parent: Option<Uuid>) -> Vec<Container> {
        let mut children: Vec<Container> = self
            .read()
            .containers
            .values()
            .filter(|c| c.kind == kind && c.parent == parent)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.key.cmp(&b.key)));
        children
    }

    fn create_container(
        &self,
        kind: EntityKind,
        parent: Option<Uuid>,
        name: &str,
        key: Option<Uuid>,
    ) -> HostResult<Container> {
        let mut state = self.write();

        if state.denied_container_names.contains(name) {
            return Err(HostError::Rejected(format!(
                "container name `{}` is not allowed",
                name
            )));
        }

        let level = match parent {
            Some(parent_key) => {
                state
                    .containers
                    .get(&(kind, parent_key))
                    .ok_or_else(|| HostError::Missing(format!("container {}", parent_key)))?
                    .level
                    + 1
            }
            None => 1,
        };

        let duplicate_name = state
            .containers
            .values()
            .any(|c| c.kind == kind && c.parent == parent && c.name.eq_ignore_ascii_case(name));
        let key = key.unwrap_or_else(Uuid::new_v4);
        if duplicate_name || state.containers.contains_key(&(kind, key)) {
            return Err(HostError::Conflict {
                kind,
                name: name.to_string(),
            });
        }

        let container = Container {
            kind,
            key,
            name: name.to_string(),
            parent,
            level,
        };
        state.containers.insert((kind, key), container.clone());
        Ok(container)
    }

    fn delete_container(&self, kind: EntityKind, key: Uuid) -> HostResult<()> {
        let mut state = self.write();
        if !state.containers.contains_key(&(kind, key)) {
            return Err(HostError::Missing(format!("container {}", key)));
        }
        let occupied = state
            .containers
            .values()
            .any(|c| c.kind == kind && c.parent == Some(key))
            || state
                .entities
                .values()
                .any(|e| e.kind == kind && e.parent == Some(key));
        if occupied {
            return Err(HostError::Rejected(format!("container {} is not empty", key)));
        }
        state.containers.remove(&(kind, key));
        Ok(())
    }
}

impl NotificationSource for InMemoryHost {
    fn subscribe(&self, kind: EntityKind, handler: NotificationHandler) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.subscribers().push((handle, kind, handler));
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|(h, _, _)| *h != handle);
        subscribers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn save_sets_level_from_container() {
        let host = InMemoryHost::new();
        let folder = host
            .create_container(EntityKind::DataType, None, "Colours", None)
            .unwrap();

        let mut entity =
            Entity::new(EntityKind::DataType, Uuid::new_v4(), "Approved").with_parent(folder.key);
        host.save(&mut entity).unwrap();

        assert_eq!(entity.level, 2);
        assert!(!entity.is_dirty());
        assert_eq!(host.save_count(), 1);
    }

    #[test]
    fn save_with_missing_parent_fails() {
        let host = InMemoryHost::new();
        let mut entity = Entity::new(EntityKind::DictionaryItem, Uuid::new_v4(), "Child")
            .with_parent(Uuid::new_v4());
        assert!(matches!(host.save(&mut entity), Err(HostError::Missing(_))));
    }

    #[test]
    fn saving_a_new_key_replaces_the_stored_entry() {
        let host = InMemoryHost::new();
        let mut parent = Entity::new(EntityKind::DictionaryItem, Uuid::new_v4(), "Greeting");
        host.save(&mut parent).unwrap();
        let mut child = Entity::new(EntityKind::DictionaryItem, Uuid::new_v4(), "Greeting.Hello")
            .with_parent(parent.key);
        host.save(&mut child).unwrap();

        let old = parent.key;
        parent.key = Uuid::new_v4();
        parent.mark_dirty();
        host.save(&mut parent).unwrap();

        assert_eq!(host.entities(EntityKind::DictionaryItem).len(), 2);
        assert!(host.entity(EntityKind::DictionaryItem, old).is_none());
        let child = host.entity(EntityKind::DictionaryItem, child.key).unwrap();
        assert_eq!(child.parent, Some(parent.key));
    }

    #[test]
    fn rekey_onto_a_taken_key_conflicts() {
        let host = InMemoryHost::new();
        let mut a = Entity::new(EntityKind::DataType, Uuid::new_v4(), "A");
        let mut b = Entity::new(EntityKind::DataType, Uuid::new_v4(), "B");
        host.save(&mut a).unwrap();
        host.save(&mut b).unwrap();

        a.key = b.key;
        assert!(matches!(host.save(&mut a), Err(HostError::Conflict { .. })));
        assert_eq!(host.entities(EntityKind::DataType).len(), 2);
    }

    #[test]
    fn duplicate_container_name_conflicts() {
        let host = InMemoryHost::new();
        host.create_container(EntityKind::DataType, None, "A", None)
            .unwrap();
        let result = host.create_container(EntityKind::DataType, None, "a", None);
        assert!(matches!(result, Err(HostError::Conflict { .. })));
    }

    #[test]
    fn delete_removes_descendants_and_notifies() {
        let host = InMemoryHost::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        host.subscribe(
            EntityKind::DictionaryItem,
            Arc::new(move |n: &Notification| {
                if n.event == NotificationEvent::Deleted {
                    sink.lock().unwrap().extend(n.entities.iter().map(|e| e.name.clone()));
                }
            }),
        );

        let mut parent = Entity::new(EntityKind::DictionaryItem, Uuid::new_v4(), "Parent");
        host.save(&mut parent).unwrap();
        let mut child =
            Entity::new(EntityKind::DictionaryItem, Uuid::new_v4(), "Child")
                .with_parent(parent.key);
        host.save(&mut child).unwrap();

        host.delete(EntityKind::DictionaryItem, parent.key).unwrap();

        assert!(host.entities(EntityKind::DictionaryItem).is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["Parent", "Child"]);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let host = InMemoryHost::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = host.subscribe(
            EntityKind::DataType,
            Arc::new(move |_: &Notification| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut entity = Entity::new(EntityKind::DataType, Uuid::new_v4(), "Text");
        host.save(&mut entity).unwrap();
        assert!(host.unsubscribe(handle));
        host.save(&mut entity).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!host.unsubscribe(handle));
    }

    #[test]
    fn non_empty_container_cannot_be_deleted() {
        let host = InMemoryHost::new();
        let folder = host
            .create_container(EntityKind::DataType, None, "Colours", None)
            .unwrap();
        let mut entity =
            Entity::new(EntityKind::DataType, Uuid::new_v4(), "Approved").with_parent(folder.key);
        host.save(&mut entity).unwrap();

        let result = host.delete_container(EntityKind::DataType, folder.key);
        assert!(matches!(result, Err(HostError::Rejected(_))));
    }
}
