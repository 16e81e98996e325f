//! Data model shared by the serializer and the orchestrator

mod change;
mod container;
mod entity;
mod node;
mod result;

pub use change::{ChangeKind, ChangeRecord};
pub use container::Container;
pub use entity::{Entity, EntityKind};
pub use node::{
    ConfigBlock, FORMAT_VERSION, FolderRef, InfoBlock, NodeAction, ParentRef, SerializedNode,
};
pub use result::SyncResult;
