//! Per-kind sync orchestration
//!
//! A [`SyncOrchestrator`] drives one handler: exporting the host hierarchy
//! to its folder, importing and reporting documents, the second pass that
//! binds forward references, stale-file cleanup and the notification bridge
//! that keeps the mirror current between batches.

mod traversal;

pub use traversal::TraversalStrategy;

use crate::adapter::EntityAdapter;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::guard::ReentrancyGuard;
use crate::host::{Notification, NotificationEvent, NotificationHandler, SubscriptionHandle};
use crate::model::{ChangeKind, Entity, EntityKind, SerializedNode, SyncResult};
use crate::serializer::{Deserialized, EntitySerializer, SerializerOptions};
use crate::settings::HandlerSettings;
use mirror_fs::{NormalizedPath, SyncFileService, to_safe_file_name};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Message attached to reports of one-way handlers for existing items
pub const ONE_WAY_MESSAGE: &str = "Existing item will not be overwritten";

/// Progress callback: item name, processed count, total count
pub type Progress<'a> = &'a dyn Fn(&str, usize, usize);

/// What an orchestrator is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Exporting,
    Importing,
    Reporting,
}

/// Flags for a single import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Apply the document even when it matches the current entity
    pub force: bool,
}

impl ImportOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Static configuration of one handler
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub alias: String,
    pub strategy: TraversalStrategy,
    /// Folder the handler's files live in
    pub folder: NormalizedPath,
    /// Document extension without the dot
    pub extension: String,
    /// Options used by the notification bridge
    pub settings: HandlerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Import,
    Report,
}

struct Inner {
    config: HandlerConfig,
    serializer: EntitySerializer,
    guard: Arc<ReentrancyGuard>,
    files: SyncFileService,
    cancel: CancelToken,
    state: Mutex<OrchestratorState>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

/// Sync driver for one entity kind
///
/// Cloning is cheap; clones share state, guard and subscription.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("alias", &self.inner.config.alias)
            .field("kind", &self.kind())
            .field("strategy", &self.inner.config.strategy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Restores the previous state when dropped
struct PhaseScope<'a> {
    state: &'a Mutex<OrchestratorState>,
    previous: OrchestratorState,
}

impl Drop for PhaseScope<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.previous;
    }
}

impl SyncOrchestrator {
    pub fn new(
        config: HandlerConfig,
        serializer: EntitySerializer,
        guard: Arc<ReentrancyGuard>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                serializer,
                guard,
                files: SyncFileService::new(),
                cancel,
                state: Mutex::new(OrchestratorState::Idle),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn alias(&self) -> &str {
        &self.inner.config.alias
    }

    pub fn kind(&self) -> EntityKind {
        self.adapter().kind()
    }

    pub fn strategy(&self) -> TraversalStrategy {
        self.inner.config.strategy
    }

    pub fn folder(&self) -> &NormalizedPath {
        &self.inner.config.folder
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.inner.config.settings
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    pub fn state(&self) -> OrchestratorState {
        *self.lock_state()
    }

    fn adapter(&self) -> &dyn EntityAdapter {
        self.inner.serializer.adapter().as_ref()
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, next: OrchestratorState) -> PhaseScope<'_> {
        let mut state = self.lock_state();
        let previous = *state;
        if previous != OrchestratorState::Idle {
            tracing::debug!(
                handler = %self.alias(),
                ?previous,
                ?next,
                "Nested orchestrator operation"
            );
        }
        *state = next;
        PhaseScope {
            state: &self.inner.state,
            previous,
        }
    }

    // ---------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------

    /// Export every entity below `root` (`None` for the whole hierarchy).
    ///
    /// A full export empties `folder` first. Entities are written parent
    /// before children; per-item failures become failed results and the
    /// walk continues.
    pub fn export_all(
        &self,
        root: Option<Uuid>,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<SyncResult>> {
        let span = tracing::info_span!("export_all", handler = %self.alias());
        let _span = span.enter();
        let _phase = self.enter(OrchestratorState::Exporting);
        let _pause = self.inner.guard.pause_scope();

        if root.is_none() {
            self.inner.files.clean_folder(folder)?;
        }

        let mut results = Vec::new();
        self.inner.config.strategy.walk(
            self.adapter(),
            root,
            &self.inner.cancel,
            &mut |entity, processed, total| {
                if let Some(progress) = progress {
                    progress(entity.name.as_str(), processed, total);
                }
                results.push(self.export_result(entity, folder, settings));
            },
        )?;

        let failed = results.iter().filter(|r| !r.success).count();
        tracing::info!(exported = results.len() - failed, failed, "Export finished");
        Ok(results)
    }

    /// Serialize one entity to its mirror file.
    pub fn export_item(
        &self,
        entity: &Entity,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
    ) -> Result<SyncResult> {
        let node = self.inner.serializer.serialize(entity)?;
        let path = self.item_path(entity, folder, settings)?;
        let written = self.inner.files.save(&path, &node)?;
        tracing::debug!(name = %entity.name, path = %path, written, "Exported");

        let change = if written {
            ChangeKind::Export
        } else {
            ChangeKind::NoChange
        };
        Ok(SyncResult::succeed(&entity.name, Some(entity.key), change).with_file(&path))
    }

    fn export_result(
        &self,
        entity: &Entity,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
    ) -> SyncResult {
        self.export_item(entity, folder, settings).unwrap_or_else(|e| {
            tracing::warn!(name = %entity.name, error = %e, "Export failed");
            SyncResult::fail(&entity.name, &e).with_key(entity.key)
        })
    }

    /// Mirror file for an entity.
    ///
    /// Directory segments come from the container chain (tree handlers) or
    /// the ancestor entities (level handlers), each made filesystem-safe.
    ///
    /// When a sibling with the same safe name already owns the file, the
    /// name is qualified with the entity key.
    pub fn item_path(
        &self,
        entity: &Entity,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
    ) -> Result<NormalizedPath> {
        let directory = if settings.use_flat_structure() {
            folder.clone()
        } else {
            let segments = match self.inner.config.strategy {
                TraversalStrategy::SingleItem => Vec::new(),
                TraversalStrategy::Tree => match entity.parent {
                    Some(container) => self
                        .inner
                        .serializer
                        .resolver()
                        .folder_path(self.kind(), container)?,
                    None => Vec::new(),
                },
                TraversalStrategy::FlatLevel => self.ancestor_names(entity)?,
            };
            let safe: Vec<String> = segments.iter().map(|s| to_safe_file_name(s)).collect();
            folder.join_all(safe.iter().map(String::as_str))
        };

        let path = directory.join(&self.file_name(entity, settings));
        if settings.guid_names() || !self.owned_by_other(&path, entity.key) {
            return Ok(path);
        }
        let qualified = format!(
            "{}_{}.{}",
            to_safe_file_name(&entity.name),
            entity.key,
            self.inner.config.extension
        );
        Ok(directory.join(&qualified))
    }

    /// True when `path` holds a readable document for a different key.
    fn owned_by_other(&self, path: &NormalizedPath, key: Uuid) -> bool {
        let files = &self.inner.files;
        files.exists(path)
            && files
                .load::<SerializedNode>(path)
                .is_ok_and(|node| node.key != key)
    }

    fn file_name(&self, entity: &Entity, settings: &HandlerSettings) -> String {
        let stem = if settings.guid_names() {
            entity.key.to_string()
        } else {
            to_safe_file_name(&entity.name)
        };
        format!("{}.{}", stem, self.inner.config.extension)
    }

    /// Names of the entity's ancestors, root first.
    fn ancestor_names(&self, entity: &Entity) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut seen = BTreeSet::from([entity.key]);
        let mut next = entity.parent;

        while let Some(key) = next {
            if !seen.insert(key) {
                return Err(Error::Validation(format!(
                    "{} `{}` has a cyclic parent chain",
                    self.kind(),
                    entity.name
                )));
            }
            let parent = self
                .adapter()
                .find_by_key(key)
                .ok_or_else(|| Error::NotFound(format!("parent {} {}", self.kind(), key)))?;
            next = parent.parent;
            names.push(parent.name);
        }

        names.reverse();
        Ok(names)
    }

    // ---------------------------------------------------------------
    // Import and report
    // ---------------------------------------------------------------

    /// Import one document.
    pub fn import(
        &self,
        file: &NormalizedPath,
        settings: &HandlerSettings,
        options: ImportOptions,
    ) -> SyncResult {
        let _phase = self.enter(OrchestratorState::Importing);
        let _pause = self.inner.guard.pause_scope();
        self.process_file(file, settings, options, Mode::Import)
    }

    /// Describe what importing a document would change, without changing it.
    pub fn report(&self, file: &NormalizedPath, settings: &HandlerSettings) -> SyncResult {
        let _phase = self.enter(OrchestratorState::Reporting);
        self.process_file(file, settings, ImportOptions::default(), Mode::Report)
    }

    /// Import every document in `folder`, parents first, then run the
    /// post-import pass. The whole batch runs under one pause scope.
    pub fn import_all(
        &self,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
        options: ImportOptions,
    ) -> Result<Vec<SyncResult>> {
        let span = tracing::info_span!("import_all", handler = %self.alias());
        let _span = span.enter();
        let _phase = self.enter(OrchestratorState::Importing);
        let _pause = self.inner.guard.pause_scope();

        let mut results = self.process_folder(folder, settings, options, Mode::Import)?;
        let post = self.post_import(folder, &results, settings);
        results.extend(post);

        let failed = results.iter().filter(|r| !r.success).count();
        let changed = results
            .iter()
            .filter(|r| r.success && r.change != ChangeKind::NoChange)
            .count();
        tracing::info!(processed = results.len(), changed, failed, "Import finished");
        Ok(results)
    }

    /// Report every document in `folder`.
    pub fn report_all(
        &self,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
    ) -> Result<Vec<SyncResult>> {
        let span = tracing::info_span!("report_all", handler = %self.alias());
        let _span = span.enter();
        let _phase = self.enter(OrchestratorState::Reporting);

        let results =
            self.process_folder(folder, settings, ImportOptions::default(), Mode::Report)?;
        let changes = results
            .iter()
            .filter(|r| r.change != ChangeKind::NoChange)
            .count();
        tracing::info!(processed = results.len(), changes, "Report finished");
        Ok(results)
    }

    fn process_file(
        &self,
        file: &NormalizedPath,
        settings: &HandlerSettings,
        options: ImportOptions,
        mode: Mode,
    ) -> SyncResult {
        match self.inner.files.load::<SerializedNode>(file) {
            Ok(node) => {
                let outcome = self.process_node(&node, &BTreeSet::new(), settings, options, mode);
                self.node_result(file, &node, outcome)
            }
            Err(e) => Self::unreadable(file, e.into()),
        }
    }

    fn process_folder(
        &self,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
        options: ImportOptions,
        mode: Mode,
    ) -> Result<Vec<SyncResult>> {
        let mut results = Vec::new();
        let mut nodes = Vec::new();

        for file in self.inner.files.list_files(folder, &self.inner.config.extension)? {
            match self.inner.files.load::<SerializedNode>(&file) {
                Ok(node) => nodes.push((file, node)),
                Err(e) => results.push(Self::unreadable(&file, e.into())),
            }
        }

        order_for_import(&mut nodes);
        let claimed: BTreeSet<Uuid> = nodes.iter().map(|(_, node)| node.key).collect();
        for (file, node) in &nodes {
            self.inner.cancel.check()?;
            let outcome = self.process_node(node, &claimed, settings, options, mode);
            results.push(self.node_result(file, node, outcome));
        }
        Ok(results)
    }

    /// `claimed` holds the keys of every document in the same batch.
    fn process_node(
        &self,
        node: &SerializedNode,
        claimed: &BTreeSet<Uuid>,
        settings: &HandlerSettings,
        options: ImportOptions,
        mode: Mode,
    ) -> Result<SyncResult> {
        if node.kind != self.kind() {
            return Err(Error::TypeMismatch(format!(
                "{} handler cannot import a {} document",
                self.alias(),
                node.kind
            )));
        }
        if node.is_tombstone() {
            return self.process_tombstone(node, settings, mode);
        }

        let serializer = &self.inner.serializer;
        if let Some(existing) = serializer.find_with(node, claimed) {
            let unchanged =
                SyncResult::succeed(&existing.name, Some(existing.key), ChangeKind::NoChange);
            if settings.is_one_way() {
                tracing::debug!(name = %existing.name, "One-way handler, existing item kept");
                return Ok(unchanged.with_message(ONE_WAY_MESSAGE));
            }
            if !options.force && serializer.is_current(node, &existing)? {
                return Ok(unchanged);
            }
        }

        let mut serializer_options =
            SerializerOptions::from_settings(settings).with_claimed_keys(claimed.clone());
        if mode == Mode::Report {
            serializer_options = serializer_options.dry_run();
        }
        let Deserialized {
            mut entity,
            changes,
            created,
            deferred,
        } = serializer.deserialize(node, &serializer_options)?;

        let change = if created {
            ChangeKind::Create
        } else if changes.is_empty() {
            ChangeKind::NoChange
        } else {
            ChangeKind::Update
        };
        if mode == Mode::Import && change != ChangeKind::NoChange {
            self.adapter().save(&mut entity)?;
        }

        let mut result =
            SyncResult::succeed(&entity.name, Some(entity.key), change).with_changes(changes);
        if !deferred.is_empty() {
            result = result.with_message(format!("Unresolved references: {}", deferred.join(", ")));
        }
        Ok(result)
    }

    fn process_tombstone(
        &self,
        node: &SerializedNode,
        settings: &HandlerSettings,
        mode: Mode,
    ) -> Result<SyncResult> {
        let Some(existing) = self.adapter().find_by_key(node.key) else {
            return Ok(SyncResult::succeed(&node.alias, Some(node.key), ChangeKind::NoChange)
                .with_message("Already deleted"));
        };
        if settings.is_one_way() {
            return Ok(SyncResult::succeed(&existing.name, Some(existing.key), ChangeKind::NoChange)
                .with_message(ONE_WAY_MESSAGE));
        }
        if mode == Mode::Import {
            self.adapter().delete(&existing)?;
        }
        Ok(SyncResult::succeed(&existing.name, Some(existing.key), ChangeKind::Delete))
    }

    fn node_result(
        &self,
        file: &NormalizedPath,
        node: &SerializedNode,
        outcome: Result<SyncResult>,
    ) -> SyncResult {
        match outcome {
            Ok(result) => result.with_file(file),
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "Item failed");
                SyncResult::fail(&node.alias, &e).with_key(node.key).with_file(file)
            }
        }
    }

    fn unreadable(file: &NormalizedPath, error: Error) -> SyncResult {
        tracing::warn!(file = %file, error = %error, "Unreadable document");
        SyncResult::fail(file.file_stem().unwrap_or(file.as_str()), &error).with_file(file)
    }

    // ---------------------------------------------------------------
    // Post-import
    // ---------------------------------------------------------------

    /// Second pass and cleanup after a batch import, using the handler's
    /// configured settings.
    pub fn process_post_import(
        &self,
        folder: &NormalizedPath,
        prior: &[SyncResult],
    ) -> Vec<SyncResult> {
        let _phase = self.enter(OrchestratorState::Importing);
        let _pause = self.inner.guard.pause_scope();
        self.post_import(folder, prior, &self.inner.config.settings)
    }

    fn post_import(
        &self,
        folder: &NormalizedPath,
        prior: &[SyncResult],
        settings: &HandlerSettings,
    ) -> Vec<SyncResult> {
        let mut results = Vec::new();

        for result in prior.iter().filter(|r| r.success) {
            let wanted = match result.change {
                ChangeKind::Create | ChangeKind::Update => true,
                ChangeKind::NoChange => !settings.is_one_way(),
                _ => false,
            };
            let (true, Some(key), Some(file)) = (wanted, result.key, result.file_path()) else {
                continue;
            };
            match self.second_pass(key, &file) {
                Ok(Some(bound)) => results.push(bound.with_file(&file)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(name = %result.name, error = %e, "Second pass failed");
                    results.push(SyncResult::fail(&result.name, &e).with_key(key).with_file(&file));
                }
            }
        }

        // Failed imports and items a one-way handler refused to touch keep their files
        let kept_files: BTreeSet<&str> = prior
            .iter()
            .filter(|r| !r.success || r.message == ONE_WAY_MESSAGE)
            .filter_map(|r| r.file.as_deref())
            .collect();
        if let Err(e) = self.clean_stale_files(folder, settings, &kept_files, &mut results) {
            tracing::warn!(folder = %folder, error = %e, "Stale file cleanup failed");
            results.push(SyncResult::fail(folder.as_str(), &e));
        }

        if self.inner.config.strategy == TraversalStrategy::Tree {
            self.prune_containers(None, &mut results);
        }
        results
    }

    fn second_pass(&self, key: Uuid, file: &NormalizedPath) -> Result<Option<SyncResult>> {
        let node: SerializedNode = self.inner.files.load(file)?;
        if node.info.references.is_empty() {
            return Ok(None);
        }
        let mut entity = self
            .adapter()
            .find_by_key(key)
            .ok_or_else(|| Error::NotFound(format!("{} {}", self.kind(), key)))?;

        let changes = self.inner.serializer.second_pass(&node, &mut entity);
        if changes.is_empty() {
            return Ok(None);
        }
        self.adapter().save(&mut entity)?;
        tracing::debug!(name = %entity.name, bound = changes.len(), "References bound");
        Ok(Some(
            SyncResult::succeed(&entity.name, Some(key), ChangeKind::Update)
                .with_changes(changes)
                .with_message("References bound"),
        ))
    }

    /// Delete files whose entity is gone or now lives at another path.
    /// Tombstones and files that failed to import are kept.
    fn clean_stale_files(
        &self,
        folder: &NormalizedPath,
        settings: &HandlerSettings,
        keep: &BTreeSet<&str>,
        results: &mut Vec<SyncResult>,
    ) -> Result<()> {
        let files = &self.inner.files;
        let mut documents = Vec::new();
        for file in files.list_files(folder, &self.inner.config.extension)? {
            if keep.contains(file.as_str()) {
                continue;
            }
            // Unreadable documents were already reported by the import
            if let Ok(node) = files.load::<SerializedNode>(&file) {
                documents.push((file, node));
            }
        }
        let claimed: BTreeSet<Uuid> = documents.iter().map(|(_, node)| node.key).collect();

        for (file, node) in documents {
            if node.is_tombstone() || node.kind != self.kind() {
                continue;
            }

            let stale = match self.inner.serializer.find_with(&node, &claimed) {
                None => true,
                Some(entity) => {
                    let expected = self.item_path(&entity, folder, settings)?;
                    expected != file && files.exists(&expected)
                }
            };
            if stale && files.delete_file(&file)? {
                tracing::debug!(file = %file, "Removed stale file");
                results.push(
                    SyncResult::succeed(&node.alias, Some(node.key), ChangeKind::Clean)
                        .with_file(&file),
                );
            }
        }
        files.remove_empty_dirs(folder)?;
        Ok(())
    }

    /// Delete empty containers bottom-up.
    fn prune_containers(&self, parent: Option<Uuid>, results: &mut Vec<SyncResult>) {
        for container in self.adapter().child_containers(parent) {
            self.prune_containers(Some(container.key), results);

            let empty = self.adapter().children(Some(container.key)).is_empty()
                && self.adapter().child_containers(Some(container.key)).is_empty();
            if !empty {
                continue;
            }
            match self.adapter().delete_container(container.key) {
                Ok(()) => {
                    tracing::debug!(container = %container.name, "Removed empty container");
                    results.push(
                        SyncResult::succeed(&container.name, Some(container.key), ChangeKind::Clean)
                            .with_message("Empty container removed"),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        container = %container.name,
                        error = %e,
                        "Container cleanup failed"
                    );
                    results.push(SyncResult::fail(&container.name, &e).with_key(container.key));
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------

    pub fn delete_item(&self, key: Uuid) -> Result<SyncResult> {
        let entity = self
            .adapter()
            .find_by_key(key)
            .ok_or_else(|| Error::NotFound(format!("{} {}", self.kind(), key)))?;
        self.adapter().delete(&entity)?;
        Ok(SyncResult::succeed(&entity.name, Some(key), ChangeKind::Delete))
    }

    pub fn delete_container(&self, key: Uuid) -> Result<()> {
        self.adapter().delete_container(key)
    }

    // ---------------------------------------------------------------
    // Event bridge
    // ---------------------------------------------------------------

    /// Subscribe to the host's notifications for this kind. Returns `false`
    /// when already subscribed.
    pub fn initialize_events(&self) -> bool {
        let mut slot = self.lock_subscription();
        if slot.is_some() {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let handler: NotificationHandler = Arc::new(move |notification: &Notification| {
            if let Some(inner) = weak.upgrade() {
                SyncOrchestrator { inner }.on_notification(notification);
            }
        });
        let handle = self.adapter().host().subscribe(self.kind(), handler);
        tracing::debug!(handler = %self.alias(), %handle, "Events initialized");
        *slot = Some(handle);
        true
    }

    /// Unsubscribe from host notifications. Returns `false` when not
    /// subscribed.
    pub fn terminate_events(&self) -> bool {
        let Some(handle) = self.lock_subscription().take() else {
            return false;
        };
        tracing::debug!(handler = %self.alias(), %handle, "Events terminated");
        self.adapter().host().unsubscribe(handle)
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<SubscriptionHandle>> {
        self.inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// React to a host notification unless a batch operation is running.
    pub fn on_notification(&self, notification: &Notification) {
        if self.inner.guard.is_paused() {
            tracing::trace!(handler = %self.alias(), "Notification ignored while paused");
            return;
        }
        if notification.kind != self.kind() {
            return;
        }

        for entity in &notification.entities {
            let outcome = match notification.event {
                NotificationEvent::Saved => self.export_changed(entity),
                NotificationEvent::Deleted => self.write_tombstone(entity),
            };
            if let Err(e) = outcome {
                tracing::warn!(
                    handler = %self.alias(),
                    name = %entity.name,
                    event = ?notification.event,
                    error = %e,
                    "Notification handling failed"
                );
            }
        }
    }

    fn export_changed(&self, entity: &Entity) -> Result<()> {
        let config = &self.inner.config;
        let result = self.export_item(entity, &config.folder, &config.settings)?;
        if let Some(path) = result.file_path() {
            // A rename or move leaves the previous file behind
            for other in self.files_for_key(entity.key)? {
                if other != path {
                    self.inner.files.delete_file(&other)?;
                }
            }
        }
        Ok(())
    }

    fn write_tombstone(&self, entity: &Entity) -> Result<()> {
        let config = &self.inner.config;
        let existing = self.files_for_key(entity.key)?;
        let path = match existing.first() {
            Some(path) => path.clone(),
            // Ancestors may have been deleted in the same operation
            None => self
                .item_path(entity, &config.folder, &config.settings)
                .unwrap_or_else(|_| config.folder.join(&self.file_name(entity, &config.settings))),
        };

        let node = SerializedNode::tombstone(
            self.kind(),
            entity.key,
            self.adapter().item_alias(entity),
            entity.level,
        );
        self.inner.files.save(&path, &node)?;
        for other in existing.iter().skip(1) {
            self.inner.files.delete_file(other)?;
        }
        tracing::debug!(name = %entity.name, path = %path, "Tombstone written");
        Ok(())
    }

    /// Mirror files in the handler folder whose document has `key`.
    fn files_for_key(&self, key: Uuid) -> Result<Vec<NormalizedPath>> {
        let files = &self.inner.files;
        let mut found = Vec::new();
        for file in files.list_files(&self.inner.config.folder, &self.inner.config.extension)? {
            if let Ok(node) = files.load::<SerializedNode>(&file) {
                if node.key == key {
                    found.push(file);
                }
            }
        }
        Ok(found)
    }
}

/// Updates first by ascending level so parents exist before children,
/// then tombstones by descending level so children go first.
fn order_for_import(nodes: &mut [(NormalizedPath, SerializedNode)]) {
    nodes.sort_by(|(_, a), (_, b)| {
        a.is_tombstone()
            .cmp(&b.is_tombstone())
            .then_with(|| {
                if a.is_tombstone() {
                    b.level.cmp(&a.level)
                } else {
                    a.level.cmp(&b.level)
                }
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn node(level: u32, tombstone: bool) -> (NormalizedPath, SerializedNode) {
        let key = Uuid::new_v4();
        let node = if tombstone {
            SerializedNode::tombstone(EntityKind::DictionaryItem, key, "x", level)
        } else {
            let mut node = SerializedNode::tombstone(EntityKind::DictionaryItem, key, "x", level);
            node.action = crate::model::NodeAction::Update;
            node
        };
        (NormalizedPath::new(format!("{}-{}.yaml", level, tombstone)), node)
    }

    #[test]
    fn import_order_is_parents_first_then_deletes_children_first() {
        let mut nodes = vec![
            node(2, true),
            node(3, false),
            node(1, true),
            node(1, false),
            node(2, false),
            node(3, true),
        ];
        order_for_import(&mut nodes);

        let order: Vec<&str> = nodes.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "1-false.yaml",
                "2-false.yaml",
                "3-false.yaml",
                "3-true.yaml",
                "2-true.yaml",
                "1-true.yaml"
            ]
        );
    }
}
