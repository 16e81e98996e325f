use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change for a field record or a whole-item result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    NoChange,
    Create,
    Update,
    Delete,
    Export,
    /// A stale file or empty container was removed
    Clean,
    Fail,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoChange => "NoChange",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Export => "Export",
            Self::Clean => "Clean",
            Self::Fail => "Fail",
        };
        f.write_str(s)
    }
}

/// One detected field difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub name: String,
    pub old: Option<String>,
    pub new: Option<String>,
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(
        kind: ChangeKind,
        name: impl Into<String>,
        old: Option<String>,
        new: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            old,
            new,
            kind,
        }
    }

    pub fn update(name: impl Into<String>, old: impl fmt::Display, new: impl fmt::Display) -> Self {
        Self::new(
            ChangeKind::Update,
            name,
            Some(old.to_string()),
            Some(new.to_string()),
        )
    }

    pub fn create(name: impl Into<String>, new: impl fmt::Display) -> Self {
        Self::new(ChangeKind::Create, name, None, Some(new.to_string()))
    }

    pub fn removed(name: impl Into<String>, old: impl fmt::Display) -> Self {
        Self::new(ChangeKind::Delete, name, Some(old.to_string()), None)
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} -> {}",
            self.kind,
            self.name,
            self.old.as_deref().unwrap_or("(none)"),
            self.new.as_deref().unwrap_or("(none)")
        )
    }
}
