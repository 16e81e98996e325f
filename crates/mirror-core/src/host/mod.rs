//! Collaborator interfaces the host service layer must provide
//!
//! The mirror never owns entities: it asks the host to find, list, save and
//! delete them, and it learns about changes through notifications. These
//! traits are the whole contract; [`memory::InMemoryHost`] implements them
//! for tests and embedding.

pub mod memory;

use crate::model::{Container, Entity, EntityKind};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Result type for host operations
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Failures reported by the host
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// A sibling with the same name or key already exists
    #[error("{kind} `{name}` already exists")]
    Conflict { kind: EntityKind, name: String },

    /// The referenced item is not there
    #[error("{0} does not exist")]
    Missing(String),

    /// Refused for a host-specific reason
    #[error("host rejected the operation: {0}")]
    Rejected(String),
}

/// Which change a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    Saved,
    Deleted,
}

/// A change notification for one entity kind
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: EntityKind,
    pub event: NotificationEvent,
    pub entities: Vec<Entity>,
}

/// Callback registered with a [`NotificationSource`]
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Token returned by [`NotificationSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

/// Entity CRUD on the host
pub trait EntityStore: Send + Sync {
    /// Find an entity by its stable key.
    fn entity(&self, kind: EntityKind, key: Uuid) -> Option<Entity>;

    /// Find an entity by alias (name or item key, per kind).
    fn entity_by_alias(&self, kind: EntityKind, alias: &str) -> Option<Entity>;

    /// Entities directly under `parent` (`None` for the root), ordered by name.
    fn children(&self, kind: EntityKind, parent: Option<Uuid>) -> Vec<Entity>;

    /// Store the entity. On success the host updates the level and marks the
    /// entity saved, then raises a `Saved` notification.
    fn save(&self, entity: &mut Entity) -> HostResult<()>;

    /// Delete an entity and its descendants, then raise `Deleted`.
    fn delete(&self, kind: EntityKind, key: Uuid) -> HostResult<()>;

    /// True when the host has a subtype definition (e.g. a data editor)
    /// registered under `alias`.
    fn has_subtype(&self, kind: EntityKind, alias: &str) -> bool;
}

/// Container (folder) management on the host
pub trait ContainerStore: Send + Sync {
    fn container(&self, kind: EntityKind, key: Uuid) -> Option<Container>;

    /// Containers directly under `parent` (`None` for the root), ordered by name.
    fn child_containers(&self, kind: EntityKind, parent: Option<Uuid>) -> Vec<Container>;

    /// Create a container. `key` pins the new container's identity when given.
    fn create_container(
        &self,
        kind: EntityKind,
        parent: Option<Uuid>,
        name: &str,
        key: Option<Uuid>,
    ) -> HostResult<Container>;

    fn delete_container(&self, kind: EntityKind, key: Uuid) -> HostResult<()>;
}

/// Observer registration for Saved/Deleted notifications
pub trait NotificationSource: Send + Sync {
    fn subscribe(&self, kind: EntityKind, handler: NotificationHandler) -> SubscriptionHandle;

    /// Returns `false` when the handle was not registered.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool;
}

/// Everything the mirror needs from the host
pub trait HostService: EntityStore + ContainerStore + NotificationSource {}

impl<T> HostService for T where T: EntityStore + ContainerStore + NotificationSource {}
