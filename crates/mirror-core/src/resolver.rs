//! Container (folder) hierarchy resolution
//!
//! Serialization walks a container's ancestor chain to build the folder
//! path written into a document; deserialization turns that path back into
//! a container, creating any missing levels on the way down.

use crate::error::{Error, Result};
use crate::host::HostService;
use crate::model::{Container, EntityKind, FolderRef};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Finds or creates containers on the host
pub struct ContainerResolver {
    host: Arc<dyn HostService>,
    // Serializes find-or-create so two resolutions of the same missing path
    // cannot both create it.
    create_lock: Mutex<()>,
}

impl ContainerResolver {
    pub fn new(host: Arc<dyn HostService>) -> Self {
        Self {
            host,
            create_lock: Mutex::new(()),
        }
    }

    /// Look up a container without creating anything.
    ///
    /// The key wins when it resolves; otherwise the name path is walked from
    /// the root, matching names case-insensitively.
    pub fn find(
        &self,
        kind: EntityKind,
        segments: &[String],
        key: Option<Uuid>,
    ) -> Option<Container> {
        if let Some(container) = key.and_then(|k| self.host.container(kind, k)) {
            return Some(container);
        }
        if segments.is_empty() {
            return None;
        }

        let mut current: Option<Container> = None;
        for segment in segments {
            let parent = current.as_ref().map(|c| c.key);
            current = Some(self.child_named(kind, parent, segment)?);
        }
        current
    }

    /// Resolve a container path, creating missing levels top-down.
    ///
    /// `key` is applied to the leaf container when it has to be created, so
    /// a container made on one machine keeps its identity on the next.
    pub fn find_or_create(
        &self,
        kind: EntityKind,
        segments: &[String],
        key: Option<Uuid>,
    ) -> Result<Container> {
        if segments.is_empty() && key.is_none() {
            return Err(Error::Validation("empty container path".into()));
        }

        let _lock = self
            .create_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(container) = key.and_then(|k| self.host.container(kind, k)) {
            return Ok(container);
        }
        if segments.is_empty() {
            return Err(Error::NotFound(format!(
                "container {} and no path to create it from",
                key.unwrap_or_default()
            )));
        }

        let last = segments.len() - 1;
        let mut parent: Option<Uuid> = None;
        let mut resolved: Option<Container> = None;

        for (index, segment) in segments.iter().enumerate() {
            let container = match self.child_named(kind, parent, segment) {
                Some(existing) => existing,
                None => {
                    let requested = if index == last { key } else { None };
                    tracing::debug!(%kind, container = %segment, "Creating container");
                    self.host
                        .create_container(kind, parent, segment, requested)
                        .map_err(|e| {
                            Error::persistence(
                                format!("container `{}`", segments[..=index].join("/")),
                                e,
                            )
                        })?
                }
            };
            parent = Some(container.key);
            resolved = Some(container);
        }

        resolved.ok_or_else(|| Error::Validation("empty container path".into()))
    }

    /// The container and its ancestors, root first.
    pub fn ancestors(&self, kind: EntityKind, key: Uuid) -> Result<Vec<Container>> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut next = Some(key);

        while let Some(current) = next {
            if !seen.insert(current) {
                return Err(Error::Validation(format!(
                    "container hierarchy contains a cycle at {}",
                    current
                )));
            }
            let container = self
                .host
                .container(kind, current)
                .ok_or_else(|| Error::NotFound(format!("container {}", current)))?;
            next = container.parent;
            chain.push(container);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Container names from the root down to `key`.
    pub fn folder_path(&self, kind: EntityKind, key: Uuid) -> Result<Vec<String>> {
        Ok(self
            .ancestors(kind, key)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Folder reference written into a serialized node.
    pub fn folder_ref(&self, kind: EntityKind, key: Uuid) -> Result<FolderRef> {
        Ok(FolderRef {
            key: Some(key),
            path: self.folder_path(kind, key)?.join("/"),
        })
    }

    fn child_named(&self, kind: EntityKind, parent: Option<Uuid>, name: &str) -> Option<Container> {
        self.host
            .child_containers(kind, parent)
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Debug for ContainerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerResolver").finish_non_exhaustive()
    }
}
