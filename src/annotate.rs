//! Change annotation
//!
//! Classifies every node of a reconciled candidate against the
//! authoritative tree and collects flat buckets for summaries and safety
//! gating. Purely structural and textual: nothing here judges whether a
//! change is a good one.
//!
//! # Status precedence
//!
//! A node carries one [`ChangeStatus`]. `LockedContentChanged` always wins.
//! Otherwise the first condition detected sets it, in the order content,
//! structure, parent. Bucket membership is independent: a node can sit in
//! the content, structure and reparented buckets at once.
//!
//! A locked node whose only change is its external link is plain
//! `ContentModified`: links stay editable under a lock.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::index::TreeIndex;
use crate::node::{ExternalLink, Importance, NodeId, TreeNode};

/// Change classification of a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Unchanged,
    New,
    ContentModified,
    LockedContentChanged,
    StructureModified,
    Reparented,
    Removed,
}

impl ChangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeStatus::Unchanged => "unchanged",
            ChangeStatus::New => "new",
            ChangeStatus::ContentModified => "content_modified",
            ChangeStatus::LockedContentChanged => "locked_content_changed",
            ChangeStatus::StructureModified => "structure_modified",
            ChangeStatus::Reparented => "reparented",
            ChangeStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of a node changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeField {
    Name,
    Description,
    Importance,
    ExternalLink,
    Children,
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    /// Change to immutable content of a locked node
    Critical,
}

/// One explained difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDetail {
    pub field: ChangeField,
    pub from: String,
    pub to: String,
    pub severity: Severity,
}

impl ChangeDetail {
    fn new(field: ChangeField, from: &str, to: &str, severity: Severity) -> Self {
        Self {
            field,
            from: String::from(from),
            to: String::from(to),
            severity,
        }
    }
}

impl fmt::Display for ChangeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: \"{}\" -> \"{}\"", self.field, self.from, self.to)?;
        if self.severity == Severity::Critical {
            f.write_str(" (critical)")?;
        }
        Ok(())
    }
}

/// Candidate node plus its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedNode {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub importance: Importance,
    pub is_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<ExternalLink>,
    #[serde(rename = "_changeStatus")]
    pub change_status: ChangeStatus,
    #[serde(rename = "_modificationDetails")]
    pub change_details: Vec<ChangeDetail>,
    /// Parent in the authoritative tree, when it differs from the current one
    #[serde(rename = "_oldParentId", skip_serializing_if = "Option::is_none")]
    pub previous_parent_id: Option<NodeId>,
    /// Synthetic stand-in for a candidate that failed validation
    #[serde(rename = "_isErrorNode", skip_serializing_if = "std::ops::Not::not")]
    pub is_error_node: bool,
    pub children: Vec<AnnotatedNode>,
}

impl AnnotatedNode {
    /// Annotation shell around `node`'s own fields, no children yet
    pub(crate) fn shell(node: &TreeNode, change_status: ChangeStatus) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            importance: node.importance,
            is_locked: node.is_locked,
            external_link: node.external_link.clone(),
            change_status,
            change_details: Vec::new(),
            previous_parent_id: None,
            is_error_node: false,
            children: Vec::new(),
        }
    }

    /// Pre-order walk over this node and its descendants
    pub fn iter(&self) -> impl Iterator<Item = &AnnotatedNode> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    pub fn find(&self, id: &str) -> Option<&AnnotatedNode> {
        self.iter().find(|n| n.id.as_str() == id)
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    pub fn has_changes(&self) -> bool {
        self.change_status != ChangeStatus::Unchanged
            || !self.change_details.is_empty()
            || self.is_error_node
    }

    /// Copy pruned to changed nodes and the ancestors leading to them.
    /// `None` when nothing in the subtree changed.
    pub fn changes_only(&self) -> Option<AnnotatedNode> {
        self.clone().into_changes_only()
    }

    fn into_changes_only(mut self) -> Option<AnnotatedNode> {
        self.children = std::mem::take(&mut self.children)
            .into_iter()
            .filter_map(AnnotatedNode::into_changes_only)
            .collect();
        (self.has_changes() || !self.children.is_empty()).then_some(self)
    }
}

/// Lightweight snapshot of a node placed in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub is_locked: bool,
    /// Parent in the tree the node was taken from; authoritative for
    /// removals, candidate otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
}

impl NodeRef {
    pub fn new(node: &TreeNode, parent_id: Option<&NodeId>) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            is_locked: node.is_locked,
            parent_id: parent_id.cloned(),
        }
    }
}

/// Removed node with the removed descendants that hung under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedSubtree {
    pub node: NodeRef,
    pub children: Vec<RemovedSubtree>,
}

impl RemovedSubtree {
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RemovedSubtree::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockViolationKind {
    /// Name, description or importance of a locked node differs
    ContentChanged,
    /// A locked node is missing from the candidate
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockViolation {
    pub node: NodeRef,
    pub kind: LockViolationKind,
    /// Critical field records; empty for removals
    pub details: Vec<ChangeDetail>,
}

/// Annotated candidate plus classification buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub annotated: AnnotatedNode,
    /// Authoritative nodes missing from the candidate, in pre-order
    pub removed: Vec<NodeRef>,
    pub new: Vec<NodeRef>,
    pub content_modified: Vec<NodeRef>,
    /// Locked nodes edited or removed; surface these prominently
    pub lock_violations: Vec<LockViolation>,
    pub structure_modified: Vec<NodeRef>,
    pub reparented: Vec<NodeRef>,
}

impl Comparison {
    fn empty(annotated: AnnotatedNode) -> Self {
        Self {
            annotated,
            removed: Vec::new(),
            new: Vec::new(),
            content_modified: Vec::new(),
            lock_violations: Vec::new(),
            structure_modified: Vec::new(),
            reparented: Vec::new(),
        }
    }

    /// True when every bucket is empty and no node records a change
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
            && self.new.is_empty()
            && self.content_modified.is_empty()
            && self.lock_violations.is_empty()
            && self.structure_modified.is_empty()
            && self.reparented.is_empty()
            && !self.annotated.iter().any(AnnotatedNode::has_changes)
    }

    pub fn has_lock_violations(&self) -> bool {
        !self.lock_violations.is_empty()
    }

    /// Status of any id from either tree; `Removed` for ids only the
    /// authoritative tree had
    pub fn status_of(&self, id: &str) -> Option<ChangeStatus> {
        if let Some(node) = self.annotated.find(id) {
            return Some(node.change_status);
        }
        self.removed
            .iter()
            .any(|r| r.id.as_str() == id)
            .then_some(ChangeStatus::Removed)
    }

    /// The `removed` bucket regrouped into subtrees. A removed node whose
    /// parent was also removed hangs under it; the rest are roots, in
    /// pre-order.
    pub fn removed_subtrees(&self) -> Vec<RemovedSubtree> {
        let removed: HashSet<&str> = self.removed.iter().map(|r| r.id.as_str()).collect();
        let mut by_parent: HashMap<&str, Vec<&NodeRef>> = HashMap::new();
        let mut roots = Vec::new();
        for r in &self.removed {
            match r.parent_id.as_ref().filter(|p| removed.contains(p.as_str())) {
                Some(parent) => by_parent.entry(parent.as_str()).or_default().push(r),
                None => roots.push(r),
            }
        }
        roots.into_iter().map(|r| grow_removed(r, &by_parent)).collect()
    }
}

fn grow_removed(node: &NodeRef, by_parent: &HashMap<&str, Vec<&NodeRef>>) -> RemovedSubtree {
    let children = by_parent
        .get(node.id.as_str())
        .map(|kids| kids.iter().map(|k| grow_removed(k, by_parent)).collect())
        .unwrap_or_default();
    RemovedSubtree {
        node: node.clone(),
        children,
    }
}

// ── Annotation pass ────────────────────────────────────────────────────

/// Classify `reconciled` against `authoritative`.
///
/// `reconciled` is expected to have gone through
/// [`crate::reconcile::reconcile`]; ids are compared verbatim.
pub fn annotate(authoritative: &TreeNode, reconciled: &TreeNode) -> Comparison {
    let auth = TreeIndex::build(authoritative);
    let cand = TreeIndex::build(reconciled);

    let mut walker = Walker {
        auth: &auth,
        buckets: Comparison::empty(AnnotatedNode::shell(reconciled, ChangeStatus::Unchanged)),
    };

    for id in auth.ids() {
        if cand.contains(id.as_str()) {
            continue;
        }
        let Some(node) = auth.node(id.as_str()) else {
            continue;
        };
        let entry = NodeRef::new(node, auth.parent_of(id.as_str()));
        if node.is_locked {
            warn!(id = %node.id, name = %node.name, "locked node removed by candidate");
            walker.buckets.lock_violations.push(LockViolation {
                node: entry.clone(),
                kind: LockViolationKind::Removed,
                details: Vec::new(),
            });
        }
        walker.buckets.removed.push(entry);
    }

    let annotated = walker.visit(reconciled, None);
    let mut comparison = walker.buckets;
    comparison.annotated = annotated;
    comparison
}

struct Walker<'i, 'a> {
    auth: &'i TreeIndex<'a>,
    buckets: Comparison,
}

impl Walker<'_, '_> {
    fn visit(&mut self, node: &TreeNode, parent: Option<&TreeNode>) -> AnnotatedNode {
        let original = match self.auth.get(node.id.as_str()) {
            Some(entry) => *entry,
            None => return self.mark_new(node, parent.map(|p| &p.id)),
        };
        let before = original.node;
        let parent_id = parent.map(|p| &p.id);
        let mut out = AnnotatedNode::shell(node, ChangeStatus::Unchanged);

        // Content
        let severity = if before.is_locked {
            Severity::Critical
        } else {
            Severity::Normal
        };
        let details = content_changes(before, node, severity);
        let link = link_change(before, node);
        if before.is_locked && !details.is_empty() {
            warn!(id = %node.id, fields = details.len(), "locked node content changed");
            out.change_status = ChangeStatus::LockedContentChanged;
            self.buckets.lock_violations.push(LockViolation {
                node: NodeRef::new(node, parent_id),
                kind: LockViolationKind::ContentChanged,
                details: details.clone(),
            });
        } else if !details.is_empty() || link.is_some() {
            out.change_status = ChangeStatus::ContentModified;
            self.buckets.content_modified.push(NodeRef::new(node, parent_id));
        }
        out.change_details.extend(details);
        out.change_details.extend(link);

        // Structure: direct child ids, order ignored
        let old_children: HashSet<&str> = before.child_ids().map(NodeId::as_str).collect();
        let new_children: HashSet<&str> = node.child_ids().map(NodeId::as_str).collect();
        if old_children != new_children {
            let left = before.child_ids().filter(|id| !new_children.contains(id.as_str()));
            let arrived = node.child_ids().filter(|id| !old_children.contains(id.as_str()));
            out.change_details.push(ChangeDetail::new(
                ChangeField::Children,
                &join_ids(left),
                &join_ids(arrived),
                Severity::Normal,
            ));
            escalate(&mut out.change_status, ChangeStatus::StructureModified);
            self.buckets.structure_modified.push(NodeRef::new(node, parent_id));
        }

        // Parent
        let old_parent = original.parent_id;
        if old_parent.map(NodeId::as_str) != parent.map(|p| p.id.as_str()) {
            let old_name = old_parent
                .and_then(|id| self.auth.node(id.as_str()))
                .map_or("(root)", |p| p.name.as_str());
            let new_name = parent.map_or("(root)", |p| p.name.as_str());
            out.change_details.push(ChangeDetail::new(
                ChangeField::Parent,
                old_name,
                new_name,
                Severity::Normal,
            ));
            out.previous_parent_id = old_parent.cloned();
            escalate(&mut out.change_status, ChangeStatus::Reparented);
            self.buckets.reparented.push(NodeRef::new(node, parent_id));
        }

        out.children = node
            .children
            .iter()
            .map(|child| self.visit(child, Some(node)))
            .collect();
        out
    }

    /// The whole subtree is new; descendants are not compared
    fn mark_new(&mut self, node: &TreeNode, parent_id: Option<&NodeId>) -> AnnotatedNode {
        self.buckets.new.push(NodeRef::new(node, parent_id));
        let mut out = AnnotatedNode::shell(node, ChangeStatus::New);
        out.children = node
            .children
            .iter()
            .map(|c| self.mark_new(c, Some(&node.id)))
            .collect();
        out
    }
}

/// Ids joined for display, `""` when there are none
fn join_ids<'a>(ids: impl Iterator<Item = &'a NodeId>) -> String {
    ids.map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

fn escalate(status: &mut ChangeStatus, to: ChangeStatus) {
    if *status == ChangeStatus::Unchanged {
        *status = to;
    }
}

fn content_changes(
    before: &TreeNode,
    after: &TreeNode,
    severity: Severity,
) -> Vec<ChangeDetail> {
    let mut details = Vec::new();
    if before.name != after.name {
        details.push(ChangeDetail::new(ChangeField::Name, &before.name, &after.name, severity));
    }
    if before.description != after.description {
        details.push(ChangeDetail::new(
            ChangeField::Description,
            &before.description,
            &after.description,
            severity,
        ));
    }
    if before.importance != after.importance {
        details.push(ChangeDetail::new(
            ChangeField::Importance,
            before.importance.as_str(),
            after.importance.as_str(),
            severity,
        ));
    }
    details
}

fn link_change(before: &TreeNode, after: &TreeNode) -> Option<ChangeDetail> {
    if before.external_link == after.external_link {
        return None;
    }
    let show = |link: &Option<ExternalLink>| {
        link.as_ref().map(ToString::to_string).unwrap_or_default()
    };
    Some(ChangeDetail::new(
        ChangeField::ExternalLink,
        &show(&before.external_link),
        &show(&after.external_link),
        Severity::Normal,
    ))
}
