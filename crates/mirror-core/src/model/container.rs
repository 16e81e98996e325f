use super::EntityKind;
use uuid::Uuid;

/// A folder-like grouping node owned by the host.
///
/// Containers with no parent hang off the root sentinel and sit at level 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub kind: EntityKind,
    pub key: Uuid,
    pub name: String,
    pub parent: Option<Uuid>,
    pub level: u32,
}
