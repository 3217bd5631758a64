//! Copy-on-write structural edits
//!
//! Every primitive borrows a tree and returns a new one; the input is never
//! touched. A target id that is not in the tree is not an error: the edit
//! is a no-op and the returned tree equals the input, since in interactive
//! use the node may simply have been removed by a concurrent edit.
//!
//! Author: Moroya Sakamoto

use tracing::debug;

use crate::config::EngineConfig;
use crate::node::{ExternalLink, Importance, TreeNode};
use crate::normalize::{fresh_node, reidentify};

/// Field updates for one node; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub importance: Option<Importance>,
    pub is_locked: Option<bool>,
    /// `Some(None)` clears the link
    pub external_link: Option<Option<ExternalLink>>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(String::from(name));
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(String::from(description));
        self
    }

    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn locked(mut self, is_locked: bool) -> Self {
        self.is_locked = Some(is_locked);
        self
    }

    pub fn link(mut self, link: Option<ExternalLink>) -> Self {
        self.external_link = Some(link);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to a single node. A blank name is ignored so names stay non-empty.
    pub fn apply(&self, node: &mut TreeNode) {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            node.name = String::from(name);
        }
        if let Some(description) = &self.description {
            node.description.clone_from(description);
        }
        if let Some(importance) = self.importance {
            node.importance = importance;
        }
        if let Some(is_locked) = self.is_locked {
            node.is_locked = is_locked;
        }
        if let Some(link) = &self.external_link {
            node.external_link.clone_from(link);
        }
    }
}

/// Copy the path from `node` down to the first node with `id`, letting
/// `edit` change the copy of the target. `None` when `id` is absent.
fn rewrite<F>(node: &TreeNode, id: &str, edit: &mut F) -> Option<TreeNode>
where
    F: FnMut(&mut TreeNode),
{
    if node.id.as_str() == id {
        let mut copy = node.clone();
        edit(&mut copy);
        return Some(copy);
    }
    let (pos, replaced) = node
        .children
        .iter()
        .enumerate()
        .find_map(|(i, child)| rewrite(child, id, edit).map(|c| (i, c)))?;
    Some(with_child_replaced(node, pos, Some(replaced)))
}

/// Copy of `node` with child `pos` swapped for `replacement`, or dropped
fn with_child_replaced(node: &TreeNode, pos: usize, replacement: Option<TreeNode>) -> TreeNode {
    let mut copy = node.clone_shallow();
    copy.children.reserve(node.children.len());
    copy.children.extend_from_slice(&node.children[..pos]);
    copy.children.extend(replacement);
    copy.children.extend_from_slice(&node.children[pos + 1..]);
    copy
}

fn rewrite_or_keep<F>(tree: &TreeNode, id: &str, op: &str, mut edit: F) -> TreeNode
where
    F: FnMut(&mut TreeNode),
{
    match rewrite(tree, id, &mut edit) {
        Some(updated) => updated,
        None => {
            debug!(id, op, "edit target not found; tree unchanged");
            tree.clone()
        }
    }
}

/// Apply `update` to the node with `id`
pub fn update_node(tree: &TreeNode, id: &str, update: &NodeUpdate) -> TreeNode {
    rewrite_or_keep(tree, id, "update_node", |node| update.apply(node))
}

/// Append a freshly identified child under `parent_id`
pub fn add_child(
    tree: &TreeNode,
    parent_id: &str,
    name: &str,
    description: &str,
    config: &EngineConfig,
) -> TreeNode {
    rewrite_or_keep(tree, parent_id, "add_child", |parent| {
        parent.children.push(fresh_node(name, description, config));
    })
}

/// Drop the node with `id` and all its descendants. The root is never removed.
pub fn remove_subtree(tree: &TreeNode, id: &str) -> TreeNode {
    if tree.id.as_str() == id {
        debug!(id, "refusing to remove the root");
        return tree.clone();
    }
    match prune(tree, id) {
        Some(pruned) => pruned,
        None => {
            debug!(id, op = "remove_subtree", "edit target not found; tree unchanged");
            tree.clone()
        }
    }
}

fn prune(node: &TreeNode, id: &str) -> Option<TreeNode> {
    for (pos, child) in node.children.iter().enumerate() {
        if child.id.as_str() == id {
            return Some(with_child_replaced(node, pos, None));
        }
        if let Some(pruned) = prune(child, id) {
            return Some(with_child_replaced(node, pos, Some(pruned)));
        }
    }
    None
}

/// Apply `update` to every direct child of `parent_id`
pub fn update_all_direct_children(
    tree: &TreeNode,
    parent_id: &str,
    update: &NodeUpdate,
) -> TreeNode {
    rewrite_or_keep(tree, parent_id, "update_all_direct_children", |parent| {
        for child in &mut parent.children {
            update.apply(child);
        }
    })
}

/// Paste a subtree authored elsewhere under `parent_id`.
///
/// Every id in the pasted copy is regenerated first, so it can never
/// collide with ids already in `tree`.
pub fn splice_foreign_subtree(tree: &TreeNode, parent_id: &str, foreign: &TreeNode) -> TreeNode {
    rewrite_or_keep(tree, parent_id, "splice_foreign_subtree", |parent| {
        parent.children.push(reidentify(foreign));
    })
}

/// Flip the lock on one node
pub fn toggle_lock(tree: &TreeNode, id: &str) -> TreeNode {
    rewrite_or_keep(tree, id, "toggle_lock", |node| node.is_locked = !node.is_locked)
}

/// Lock or unlock every node in the tree
pub fn set_lock_all(tree: &TreeNode, is_locked: bool) -> TreeNode {
    TreeNode {
        is_locked,
        children: tree
            .children
            .iter()
            .map(|c| set_lock_all(c, is_locked))
            .collect(),
        ..tree.clone_shallow()
    }
}
