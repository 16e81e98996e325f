//! Hierarchy traversal strategies

use crate::adapter::EntityAdapter;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::Entity;
use uuid::Uuid;

/// How a handler walks its entity hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalStrategy {
    /// Entities grouped in containers; files nest under container names
    Tree,
    /// Entities nested under other entities; files nest under ancestor names
    FlatLevel,
    /// No hierarchy; every file sits in the handler folder
    SingleItem,
}

/// Visitor called once per entity with its 1-based position among its
/// siblings and the sibling count.
pub(crate) type Visit<'a> = dyn FnMut(&Entity, usize, usize) + 'a;

impl TraversalStrategy {
    /// Walk every entity below `root`, parents before their children.
    ///
    /// `root` is a container key for [`Tree`](Self::Tree) and an entity key
    /// for [`FlatLevel`](Self::FlatLevel); `None` starts at the top.
    pub(crate) fn walk(
        &self,
        adapter: &dyn EntityAdapter,
        root: Option<Uuid>,
        cancel: &CancelToken,
        visit: &mut Visit<'_>,
    ) -> Result<()> {
        match self {
            Self::Tree => walk_tree(adapter, root, cancel, visit),
            Self::FlatLevel => walk_levels(adapter, root, cancel, visit),
            Self::SingleItem => visit_siblings(&adapter.children(root), cancel, visit),
        }
    }
}

fn visit_siblings(siblings: &[Entity], cancel: &CancelToken, visit: &mut Visit<'_>) -> Result<()> {
    let total = siblings.len();
    for (index, entity) in siblings.iter().enumerate() {
        cancel.check()?;
        visit(entity, index + 1, total);
    }
    Ok(())
}

fn walk_tree(
    adapter: &dyn EntityAdapter,
    container: Option<Uuid>,
    cancel: &CancelToken,
    visit: &mut Visit<'_>,
) -> Result<()> {
    cancel.check()?;
    visit_siblings(&adapter.children(container), cancel, visit)?;
    for child in adapter.child_containers(container) {
        walk_tree(adapter, Some(child.key), cancel, visit)?;
    }
    Ok(())
}

fn walk_levels(
    adapter: &dyn EntityAdapter,
    parent: Option<Uuid>,
    cancel: &CancelToken,
    visit: &mut Visit<'_>,
) -> Result<()> {
    let siblings = adapter.children(parent);
    let total = siblings.len();
    for (index, entity) in siblings.iter().enumerate() {
        cancel.check()?;
        visit(entity, index + 1, total);
        walk_levels(adapter, Some(entity.key), cancel, visit)?;
    }
    Ok(())
}
