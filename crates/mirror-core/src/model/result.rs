use super::{ChangeKind, ChangeRecord};
use crate::Error;
use mirror_fs::NormalizedPath;
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one processed file or entity
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub key: Option<Uuid>,
    pub name: String,
    pub change: ChangeKind,
    pub message: String,
    /// Error detail for failed items
    pub failure: Option<String>,
    /// Mirror file the item was read from or written to
    pub file: Option<String>,
    pub changes: Vec<ChangeRecord>,
}

impl SyncResult {
    /// A successful outcome.
    pub fn succeed(name: impl Into<String>, key: Option<Uuid>, change: ChangeKind) -> Self {
        Self {
            success: true,
            key,
            name: name.into(),
            change,
            message: String::new(),
            failure: None,
            file: None,
            changes: Vec::new(),
        }
    }

    /// A failed outcome carrying the error text.
    pub fn fail(name: impl Into<String>, error: &Error) -> Self {
        Self {
            success: false,
            key: None,
            name: name.into(),
            change: ChangeKind::Fail,
            message: format!("{:?}", error.class()),
            failure: Some(error.to_string()),
            file: None,
            changes: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: Uuid) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_file(mut self, file: &NormalizedPath) -> Self {
        self.file = Some(file.as_str().to_string());
        self
    }

    pub fn with_changes(mut self, changes: Vec<ChangeRecord>) -> Self {
        self.changes = changes;
        self
    }

    /// The mirror file as a path, when one is attached.
    pub fn file_path(&self) -> Option<NormalizedPath> {
        self.file.as_deref().map(NormalizedPath::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_detail() {
        let err = Error::NotFound("(Missing package?) data editor `X` is not installed".into());
        let result = SyncResult::fail("Colour", &err).with_file(&NormalizedPath::new("a/b.yaml"));

        assert!(!result.success);
        assert_eq!(result.change, ChangeKind::Fail);
        assert_eq!(result.message, "NotFound");
        assert!(result.failure.as_deref().unwrap().contains("Missing package"));
        assert_eq!(result.file_path(), Some(NormalizedPath::new("a/b.yaml")));
    }
}
