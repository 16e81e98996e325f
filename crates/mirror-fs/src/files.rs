//! File-storage operations used by the sync pipeline

use crate::{DocumentStore, Error, NormalizedPath, Result, io};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;

/// File service for mirror folders.
///
/// All reads and writes are blocking. Writes go through
/// [`io::write_if_changed`], so re-exporting an unchanged entity does not
/// touch the file.
#[derive(Debug, Default, Clone)]
pub struct SyncFileService {
    store: DocumentStore,
}

impl SyncFileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a file exists.
    pub fn exists(&self, path: &NormalizedPath) -> bool {
        path.is_file()
    }

    /// Fail with [`Error::FileNotFound`] unless the file exists.
    pub fn ensure_file_exists(&self, path: &NormalizedPath) -> Result<()> {
        if self.exists(path) {
            Ok(())
        } else {
            Err(Error::FileNotFound {
                path: path.to_native(),
            })
        }
    }

    /// Read a file as text.
    pub fn read_text(&self, path: &NormalizedPath) -> Result<String> {
        io::read_text(path)
    }

    /// Write text, creating parent directories. Returns `true` if the file
    /// content changed.
    pub fn write_text(&self, path: &NormalizedPath, content: &str) -> Result<bool> {
        io::write_if_changed(path, content.as_bytes())
    }

    /// Load a structured document, format chosen by extension.
    pub fn load<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<T> {
        self.ensure_file_exists(path)?;
        self.store.load(path)
    }

    /// Render a structured document without writing it.
    pub fn render<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<String> {
        self.store.render(path, value)
    }

    /// Save a structured document. Returns `true` if the file content changed.
    pub fn save<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<bool> {
        self.store.save(path, value)
    }

    /// Recursively list files under `folder` whose extension matches
    /// `extension` (case-insensitive). The result is sorted so traversal
    /// order is deterministic. A missing folder yields an empty list.
    pub fn list_files(
        &self,
        folder: &NormalizedPath,
        extension: &str,
    ) -> Result<Vec<NormalizedPath>> {
        let mut files = Vec::new();
        if folder.is_dir() {
            collect_files(folder, extension, &mut files)?;
        }
        files.sort();
        Ok(files)
    }

    /// Delete a single file. Returns `false` when there was nothing to delete.
    pub fn delete_file(&self, path: &NormalizedPath) -> Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        let native = path.to_native();
        fs::remove_file(&native).map_err(|e| Error::io(&native, e))?;
        tracing::debug!(path = %path, "Deleted file");
        Ok(true)
    }

    /// Remove everything inside `folder`, leaving the (empty) folder in place.
    pub fn clean_folder(&self, folder: &NormalizedPath) -> Result<()> {
        let native = folder.to_native();
        if native.is_dir() {
            let entries = fs::read_dir(&native).map_err(|e| Error::io(&native, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| Error::io(&native, e))?;
                let entry_path = entry.path();
                let removed = if entry_path.is_dir() {
                    fs::remove_dir_all(&entry_path)
                } else {
                    fs::remove_file(&entry_path)
                };
                removed.map_err(|e| Error::io(&entry_path, e))?;
            }
        }
        fs::create_dir_all(&native).map_err(|e| Error::io(&native, e))?;
        tracing::debug!(folder = %folder, "Cleaned folder");
        Ok(())
    }

    /// Remove empty directories below `folder` (bottom-up). The folder itself
    /// is kept. Returns the number of directories removed.
    pub fn remove_empty_dirs(&self, folder: &NormalizedPath) -> Result<usize> {
        if !folder.is_dir() {
            return Ok(0);
        }
        prune_dirs(folder)
    }
}

fn collect_files(
    folder: &NormalizedPath,
    extension: &str,
    files: &mut Vec<NormalizedPath>,
) -> Result<()> {
    let native = folder.to_native();
    let entries = fs::read_dir(&native).map_err(|e| Error::io(&native, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&native, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Temp files from in-flight atomic writes
        if name.starts_with('.') {
            continue;
        }
        let path = folder.join(&name);
        if entry.path().is_dir() {
            collect_files(&path, extension, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn prune_dirs(folder: &NormalizedPath) -> Result<usize> {
    let native = folder.to_native();
    let mut removed = 0;
    let entries = fs::read_dir(&native).map_err(|e| Error::io(&native, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&native, e))?;
        let entry_path = entry.path();
        if !entry_path.is_dir() {
            continue;
        }
        let child = NormalizedPath::new(&entry_path);
        removed += prune_dirs(&child)?;
        let is_empty = fs::read_dir(&entry_path)
            .map_err(|e| Error::io(&entry_path, e))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(&entry_path).map_err(|e| Error::io(&entry_path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn list_files_is_recursive_and_sorted() {
        let temp = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp.path());
        let service = SyncFileService::new();

        service.write_text(&root.join("b.yaml"), "b").unwrap();
        service.write_text(&root.join("a/c.yaml"), "c").unwrap();
        service.write_text(&root.join("a/ignored.txt"), "x").unwrap();

        let files = service.list_files(&root, "yaml").unwrap();
        let relative: Vec<_> = files.iter().filter_map(|f| f.strip_prefix(&root)).collect();
        assert_eq!(relative, vec!["a/c.yaml", "b.yaml"]);
    }

    #[test]
    fn list_files_on_missing_folder_is_empty() {
        let temp = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp.path()).join("missing");
        let files = SyncFileService::new().list_files(&root, "yaml").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn remove_empty_dirs_keeps_root_and_non_empty() {
        let temp = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp.path());
        let service = SyncFileService::new();

        fs::create_dir_all(temp.path().join("empty/nested")).unwrap();
        service.write_text(&root.join("full/item.yaml"), "x").unwrap();

        let removed = service.remove_empty_dirs(&root).unwrap();
        assert_eq!(removed, 2);
        assert!(root.is_dir());
        assert!(root.join("full").is_dir());
        assert!(!root.join("empty").exists());
    }
}
