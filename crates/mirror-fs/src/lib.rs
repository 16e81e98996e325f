//! Filesystem layer for the entity mirror
//!
//! Provides normalized path handling, atomic locked writes, filesystem-safe
//! naming, format-by-extension document storage and the file-service
//! operations the sync pipeline consumes.

pub mod checksum;
pub mod document;
pub mod error;
pub mod files;
pub mod io;
pub mod naming;
pub mod path;

pub use document::{DocumentFormat, DocumentStore};
pub use error::{Error, Result};
pub use files::SyncFileService;
pub use naming::to_safe_file_name;
pub use path::NormalizedPath;
