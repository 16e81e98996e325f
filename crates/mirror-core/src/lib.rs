//! Bidirectional file mirror for hierarchical host entities
//!
//! `mirror-core` keeps one document per host entity in a folder tree that
//! mirrors the entity hierarchy, and applies those documents back to the
//! host as field-level changes.
//!
//! - **ReentrancyGuard**: suppresses notification-driven exports while a
//!   batch is running
//! - **ContainerResolver**: finds or creates the container chain of a path
//! - **EntityAdapter**: per-kind lookup, creation and persistence
//! - **EntitySerializer**: entity to document and back, with change records
//! - **ConfigPayloadRegistry**: per-subtype codecs for configuration payloads
//! - **SyncOrchestrator**: export, import, report, second pass, cleanup and
//!   the notification bridge for one handler
//!
//! # Architecture
//!
//! ```text
//!                 SyncService
//!                      |
//!              SyncOrchestrator (per handler)
//!             /        |          \
//!   EntitySerializer  ReentrancyGuard  mirror-fs
//!     /     |     \
//! adapter resolver payload registry
//!     \     |
//!      HostService
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mirror_core::{SyncService, host::memory::InMemoryHost};
//! use mirror_fs::NormalizedPath;
//! use std::sync::Arc;
//!
//! let host = Arc::new(InMemoryHost::new());
//! let service = SyncService::load(host, &NormalizedPath::new("/site"))?;
//! let results = service.export_all(None)?;
//! ```

pub mod adapter;
pub mod cancel;
pub mod error;
pub mod guard;
pub mod host;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod payload;
pub mod resolver;
pub mod serializer;
pub mod service;
pub mod settings;

pub use adapter::{DataTypeAdapter, DictionaryAdapter, EntityAdapter};
pub use cancel::CancelToken;
pub use error::{Error, ErrorClass, Result};
pub use guard::{PauseScope, ReentrancyGuard};
pub use host::{HostError, HostService};
pub use model::{
    ChangeKind, ChangeRecord, ConfigBlock, Container, Entity, EntityKind, SerializedNode,
    SyncResult,
};
pub use orchestrator::{
    HandlerConfig, ImportOptions, ONE_WAY_MESSAGE, OrchestratorState, SyncOrchestrator,
    TraversalStrategy,
};
pub use payload::{ConfigPayloadRegistry, OpaqueJsonCodec, PayloadCodec, StructuredCodec};
pub use resolver::ContainerResolver;
pub use serializer::{Deserialized, EntitySerializer, SerializerOptions};
pub use service::{DATA_TYPE_HANDLER, DICTIONARY_HANDLER, HandlerDefinition, SyncService};
pub use settings::{HandlerSettings, SyncSettings};
