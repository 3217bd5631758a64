//! Flat id index over a tree
//!
//! One traversal builds an id → (node, parent) table so that lookups,
//! parent queries and ancestor paths are O(1) per step instead of a fresh
//! search of the whole tree.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::node::{NodeId, TreeNode};

/// Node plus the weak link to its parent
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'a> {
    pub node: &'a TreeNode,
    /// `None` for the root
    pub parent_id: Option<&'a NodeId>,
    /// Root is depth 0
    pub depth: usize,
}

/// Id → entry table borrowed from a tree
#[derive(Debug, Clone)]
pub struct TreeIndex<'a> {
    entries: HashMap<&'a str, IndexEntry<'a>>,
    /// Pre-order, first occurrence of each id only
    order: Vec<&'a NodeId>,
    duplicates: Vec<&'a NodeId>,
}

/// Ancestors of a node, root first, parent last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorPath {
    pub ids: Vec<NodeId>,
    /// Id at which the walk revisited itself and stopped
    pub cycle_at: Option<NodeId>,
}

impl AncestorPath {
    pub fn is_complete(&self) -> bool {
        self.cycle_at.is_none()
    }
}

impl<'a> TreeIndex<'a> {
    /// Index every node of `tree`. When an id repeats, the first
    /// occurrence in pre-order wins and the repeat is recorded.
    pub fn build(tree: &'a TreeNode) -> Self {
        let mut index = Self {
            entries: HashMap::new(),
            order: Vec::new(),
            duplicates: Vec::new(),
        };
        let mut stack: Vec<(&'a TreeNode, Option<&'a NodeId>, usize)> = vec![(tree, None, 0)];
        while let Some((node, parent_id, depth)) = stack.pop() {
            if index.entries.contains_key(node.id.as_str()) {
                index.duplicates.push(&node.id);
            } else {
                index.entries.insert(
                    node.id.as_str(),
                    IndexEntry {
                        node,
                        parent_id,
                        depth,
                    },
                );
                index.order.push(&node.id);
            }
            for child in node.children.iter().rev() {
                stack.push((child, Some(&node.id), depth + 1));
            }
        }
        index
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry<'a>> {
        self.entries.get(id)
    }

    pub fn node(&self, id: &str) -> Option<&'a TreeNode> {
        self.entries.get(id).map(|e| e.node)
    }

    pub fn parent_of(&self, id: &str) -> Option<&'a NodeId> {
        self.entries.get(id).and_then(|e| e.parent_id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct ids in pre-order
    pub fn ids(&self) -> impl Iterator<Item = &'a NodeId> + '_ {
        self.order.iter().copied()
    }

    /// Ids that appeared more than once; lookups resolve to the first
    pub fn duplicate_ids(&self) -> &[&'a NodeId] {
        &self.duplicates
    }

    /// Walk parent links up from `id`.
    ///
    /// Stops at the first revisited id instead of looping, so the path is
    /// never longer than the number of indexed nodes. An unknown id yields
    /// an empty path.
    pub fn ancestor_path(&self, id: &str) -> AncestorPath {
        let mut path = AncestorPath::default();
        let start = match self.entries.get(id) {
            Some(entry) => entry,
            None => return path,
        };

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(start.node.id.as_str());
        let mut current = start.parent_id;

        while let Some(parent_id) = current {
            if !visited.insert(parent_id.as_str()) {
                warn!(
                    start = id,
                    revisited = %parent_id,
                    "cycle in parent links; ancestor walk aborted"
                );
                path.cycle_at = Some(parent_id.clone());
                break;
            }
            match self.entries.get(parent_id.as_str()) {
                Some(entry) => {
                    path.ids.push(parent_id.clone());
                    current = entry.parent_id;
                }
                None => break,
            }
        }

        path.ids.reverse();
        path
    }
}

/// One-shot [`TreeIndex::ancestor_path`]; build an index for repeated use
pub fn ancestor_path(tree: &TreeNode, id: &str) -> AncestorPath {
    TreeIndex::build(tree).ancestor_path(id)
}
