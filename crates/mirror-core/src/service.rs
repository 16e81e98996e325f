//! Handler registry and whole-mirror operations
//!
//! Builds one orchestrator per enabled handler. All handlers share one
//! reentrancy guard, one container resolver, one payload registry and one
//! cancel token, and run in priority order.

use crate::adapter::adapter_for;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::guard::ReentrancyGuard;
use crate::host::HostService;
use crate::model::{EntityKind, SyncResult};
use crate::orchestrator::{
    HandlerConfig, ImportOptions, Progress, SyncOrchestrator, TraversalStrategy,
};
use crate::payload::ConfigPayloadRegistry;
use crate::resolver::ContainerResolver;
use crate::serializer::EntitySerializer;
use crate::settings::{SETTINGS_FILE, SyncSettings};
use mirror_fs::NormalizedPath;
use std::sync::Arc;

/// Alias of the data type handler
pub const DATA_TYPE_HANDLER: &str = "dataTypeHandler";

/// Alias of the dictionary handler
pub const DICTIONARY_HANDLER: &str = "dictionaryHandler";

/// Static description of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerDefinition {
    pub alias: &'static str,
    /// Folder name under the mirror root
    pub folder: &'static str,
    pub kind: EntityKind,
    pub strategy: TraversalStrategy,
    /// Lower runs first
    pub priority: u32,
}

/// Every handler the mirror knows, in priority order
pub const HANDLERS: &[HandlerDefinition] = &[
    HandlerDefinition {
        alias: DATA_TYPE_HANDLER,
        folder: "DataTypes",
        kind: EntityKind::DataType,
        strategy: TraversalStrategy::Tree,
        priority: 10,
    },
    HandlerDefinition {
        alias: DICTIONARY_HANDLER,
        folder: "Dictionary",
        kind: EntityKind::DictionaryItem,
        strategy: TraversalStrategy::FlatLevel,
        priority: 20,
    },
];

/// The mirror as a whole
#[derive(Debug)]
pub struct SyncService {
    root: NormalizedPath,
    guard: Arc<ReentrancyGuard>,
    cancel: CancelToken,
    handlers: Vec<SyncOrchestrator>,
}

impl SyncService {
    /// Build the service with the opaque payload codec for every subtype.
    pub fn new(host: Arc<dyn HostService>, base: &NormalizedPath, settings: &SyncSettings) -> Self {
        Self::with_registry(host, base, settings, ConfigPayloadRegistry::new())
    }

    /// Build the service from `mirror.toml` in `base`, or defaults.
    pub fn load(host: Arc<dyn HostService>, base: &NormalizedPath) -> Result<Self> {
        let settings = SyncSettings::load(&base.join(SETTINGS_FILE))?;
        Ok(Self::new(host, base, &settings))
    }

    pub fn with_registry(
        host: Arc<dyn HostService>,
        base: &NormalizedPath,
        settings: &SyncSettings,
        registry: ConfigPayloadRegistry,
    ) -> Self {
        let root = base.join(&settings.root_folder);
        let guard = Arc::new(ReentrancyGuard::new());
        let cancel = CancelToken::new();
        let resolver = Arc::new(ContainerResolver::new(host.clone()));
        let registry = Arc::new(registry);

        let mut definitions: Vec<&HandlerDefinition> = HANDLERS.iter().collect();
        definitions.sort_by_key(|d| d.priority);

        let handlers = definitions
            .into_iter()
            .filter_map(|definition| {
                let handler_settings = settings.handler(definition.alias);
                if !handler_settings.enabled {
                    tracing::info!(handler = definition.alias, "Handler disabled");
                    return None;
                }
                let serializer = EntitySerializer::new(
                    adapter_for(definition.kind, host.clone()),
                    resolver.clone(),
                    registry.clone(),
                );
                let config = HandlerConfig {
                    alias: definition.alias.to_string(),
                    strategy: definition.strategy,
                    folder: root.join(definition.folder),
                    extension: settings.file_extension.clone(),
                    settings: handler_settings,
                };
                Some(SyncOrchestrator::new(
                    config,
                    serializer,
                    guard.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            root,
            guard,
            cancel,
            handlers,
        }
    }

    /// Mirror root folder
    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn guard(&self) -> &Arc<ReentrancyGuard> {
        &self.guard
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Enabled handlers in priority order.
    pub fn handlers(&self) -> &[SyncOrchestrator] {
        &self.handlers
    }

    pub fn handler(&self, kind: EntityKind) -> Option<&SyncOrchestrator> {
        self.handlers.iter().find(|h| h.kind() == kind)
    }

    pub fn handler_by_alias(&self, alias: &str) -> Option<&SyncOrchestrator> {
        self.handlers
            .iter()
            .find(|h| h.alias().eq_ignore_ascii_case(alias))
    }

    /// Export every handler into its folder.
    pub fn export_all(&self, progress: Option<Progress<'_>>) -> Result<Vec<SyncResult>> {
        let _pause = self.guard.pause_scope();
        let mut results = Vec::new();
        for handler in &self.handlers {
            let exported =
                handler.export_all(None, handler.folder(), handler.settings(), progress)?;
            results.extend(exported);
        }
        Ok(results)
    }

    /// Import every handler's folder.
    pub fn import_all(&self, options: ImportOptions) -> Result<Vec<SyncResult>> {
        let _pause = self.guard.pause_scope();
        let mut results = Vec::new();
        for handler in &self.handlers {
            results.extend(handler.import_all(handler.folder(), handler.settings(), options)?);
        }
        Ok(results)
    }

    /// Report every handler's folder.
    pub fn report_all(&self) -> Result<Vec<SyncResult>> {
        let mut results = Vec::new();
        for handler in &self.handlers {
            results.extend(handler.report_all(handler.folder(), handler.settings())?);
        }
        Ok(results)
    }

    /// Subscribe every handler to host notifications.
    pub fn initialize_events(&self) {
        for handler in &self.handlers {
            handler.initialize_events();
        }
    }

    pub fn terminate_events(&self) {
        for handler in &self.handlers {
            handler.terminate_events();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::InMemoryHost;
    use crate::settings::HandlerSettings;

    #[test]
    fn handlers_run_in_priority_order() {
        let host = Arc::new(InMemoryHost::new());
        let service =
            SyncService::new(host, &NormalizedPath::new("/base"), &SyncSettings::default());

        let aliases: Vec<&str> = service.handlers().iter().map(|h| h.alias()).collect();
        assert_eq!(aliases, vec![DATA_TYPE_HANDLER, DICTIONARY_HANDLER]);
        assert_eq!(service.root().as_str(), "/base/mirror");
        assert_eq!(
            service.handler(EntityKind::DictionaryItem).unwrap().folder().as_str(),
            "/base/mirror/Dictionary"
        );
    }

    #[test]
    fn disabled_handlers_are_skipped() {
        let host = Arc::new(InMemoryHost::new());
        let settings = SyncSettings::default()
            .with_handler(DICTIONARY_HANDLER, HandlerSettings::new().disabled());
        let service = SyncService::new(host, &NormalizedPath::new("/base"), &settings);

        assert!(service.handler(EntityKind::DictionaryItem).is_none());
        assert!(service.handler_by_alias("DATATYPEHANDLER").is_some());
    }
}
