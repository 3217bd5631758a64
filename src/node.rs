//! Tree document model
//!
//! Named, described nodes arranged in a strict parent/child hierarchy.
//! Each node owns its children; parent links are never stored on the
//! node itself and are recovered on demand by [`crate::index::TreeIndex`].
//!
//! Author: Moroya Sakamoto

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable, opaque node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random identifier (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(String::from(value))
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How prominent a node is
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Minor,
    #[default]
    Common,
    Major,
}

impl Importance {
    pub fn as_str(self) -> &'static str {
        match self {
            Importance::Minor => "minor",
            Importance::Common => "common",
            Importance::Major => "major",
        }
    }

    /// Parse a label, ignoring case and surrounding whitespace
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "minor" => Some(Importance::Minor),
            "common" => Some(Importance::Common),
            "major" => Some(Importance::Major),
            _ => None,
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory reference to another tree document. Never traversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLink {
    pub target_id: String,
    pub target_name: String,
}

impl ExternalLink {
    pub fn new(target_id: &str, target_name: &str) -> Self {
        Self {
            target_id: String::from(target_id),
            target_name: String::from(target_name),
        }
    }
}

impl fmt::Display for ExternalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target_name, self.target_id)
    }
}

/// A node and, recursively, its subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Unique within the whole tree
    pub id: NodeId,
    /// Display label, never blank
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub importance: Importance,
    /// Name, description and importance are immutable under reconciliation
    #[serde(default)]
    pub is_locked: bool,
    /// Display order
    #[serde(default)]
    pub children: Vec<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_link: Option<ExternalLink>,
}

impl TreeNode {
    pub fn new(id: impl Into<NodeId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: String::from(name),
            description: String::new(),
            importance: Importance::default(),
            is_locked: false,
            children: Vec::new(),
            external_link: None,
        }
    }

    pub fn with_fresh_id(name: &str) -> Self {
        Self::new(NodeId::generate(), name)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = String::from(description);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn locked(mut self, is_locked: bool) -> Self {
        self.is_locked = is_locked;
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_link(mut self, link: ExternalLink) -> Self {
        self.external_link = Some(link);
        self
    }

    /// Clone of this node's own fields, without children
    pub(crate) fn clone_shallow(&self) -> TreeNode {
        TreeNode {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            importance: self.importance,
            is_locked: self.is_locked,
            children: Vec::new(),
            external_link: self.external_link.clone(),
        }
    }

    /// Ids of the direct children, in display order
    pub fn child_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.children.iter().map(|c| &c.id)
    }

    /// Pre-order walk over this node and every descendant
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Depth-first search by id; the first match wins when ids repeat
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        self.iter().find(|n| n.id.as_str() == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut TreeNode> {
        if self.id.as_str() == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Nodes whose name or description contains `term`, ignoring case,
    /// in pre-order. A blank term matches nothing.
    pub fn find_by_term(&self, term: &str) -> Vec<&TreeNode> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.iter()
            .filter(|n| {
                n.name.to_lowercase().contains(&needle)
                    || n.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Number of levels; a lone root is depth 1
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    /// Every id in pre-order
    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|n| n.id.clone()).collect()
    }

    pub fn locked_node_ids(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|n| n.is_locked)
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn all_locked(&self) -> bool {
        self.iter().all(|n| n.is_locked)
    }

    /// Ids of nodes that have at least one child
    pub fn expandable_node_ids(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|n| !n.children.is_empty())
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn importance_counts(&self) -> ImportanceCounts {
        let mut counts = ImportanceCounts::default();
        for node in self.iter() {
            match node.importance {
                Importance::Minor => counts.minor += 1,
                Importance::Common => counts.common += 1,
                Importance::Major => counts.major += 1,
            }
        }
        counts
    }
}

/// Pre-order iterator over a subtree
pub struct Preorder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Node tally per importance level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportanceCounts {
    pub minor: usize,
    pub common: usize,
    pub major: usize,
}
