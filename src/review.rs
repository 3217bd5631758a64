//! Review pipeline
//!
//! Runs parse, reconcile and annotate over an untrusted candidate and
//! hands back a [`Comparison`] for approval. Malformed candidates fail
//! closed into a synthetic error result; nothing from them is trusted.
//!
//! Author: Moroya Sakamoto

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::annotate::{annotate, AnnotatedNode, ChangeStatus, Comparison, NodeRef};
use crate::config::EngineConfig;
use crate::error::ShapeError;
use crate::index::TreeIndex;
use crate::normalize::{parse_candidate, parse_candidate_str};
use crate::node::{NodeId, TreeNode};
use crate::reconcile::reconcile;

/// Name given to the stand-in node of a malformed candidate
pub const ERROR_NODE_NAME: &str = "Invalid Suggestion Structure";

/// Keys that only exist on annotated output
pub const ANNOTATION_KEYS: [&str; 5] = [
    "_changeStatus",
    "_modificationDetails",
    "_oldParentId",
    "_isErrorNode",
    "_parentId",
];

// ── Pipeline ───────────────────────────────────────────────────────────

/// Compare an untrusted candidate value against the authoritative tree
pub fn compare(authoritative: &TreeNode, raw: &Value, config: &EngineConfig) -> Comparison {
    finish(authoritative, parse_candidate(raw, authoritative, config), config)
}

/// [`compare`] over JSON text
pub fn compare_str(authoritative: &TreeNode, text: &str, config: &EngineConfig) -> Comparison {
    finish(
        authoritative,
        parse_candidate_str(text, authoritative, config),
        config,
    )
}

fn finish(
    authoritative: &TreeNode,
    parsed: Result<TreeNode, ShapeError>,
    config: &EngineConfig,
) -> Comparison {
    let mut candidate = match parsed {
        Ok(candidate) => candidate,
        Err(err) => {
            warn!(error = %err, "candidate rejected, failing closed");
            return Comparison::malformed(authoritative, &err);
        }
    };
    reconcile(authoritative, &mut candidate, config);
    let comparison = annotate(authoritative, &candidate);
    debug!(
        new = comparison.new.len(),
        removed = comparison.removed.len(),
        modified = comparison.content_modified.len(),
        violations = comparison.lock_violations.len(),
        "candidate compared"
    );
    comparison
}

/// The clean tree to persist once a reviewer approves, `None` when the
/// comparison stands in for a malformed candidate
pub fn accept(comparison: Comparison) -> Option<TreeNode> {
    if comparison.is_error() {
        return None;
    }
    Some(comparison.annotated.into_clean())
}

// ── Error result & summary ─────────────────────────────────────────────

/// Totals shown alongside an approval prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub current_total: usize,
    pub suggested_total: usize,
    /// `suggested_total - current_total`
    pub net_change: i64,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub structure: usize,
    pub moved: usize,
    pub lock_violations: usize,
}

impl Comparison {
    /// Error result for a candidate that failed validation.
    ///
    /// The annotated tree is a lone error node and the whole authoritative
    /// tree is reported removed, so the result can never pass as a no-op.
    /// Nothing is reported new; check [`Comparison::is_error`].
    pub fn malformed(authoritative: &TreeNode, err: &ShapeError) -> Self {
        let stand_in = TreeNode::new(NodeId::generate(), ERROR_NODE_NAME)
            .with_description(&err.to_string());
        let mut annotated = AnnotatedNode::shell(&stand_in, ChangeStatus::Unchanged);
        annotated.is_error_node = true;

        let index = TreeIndex::build(authoritative);
        let removed = index
            .ids()
            .filter_map(|id| index.node(id.as_str()))
            .map(|node| NodeRef::new(node, index.parent_of(node.id.as_str())))
            .collect();

        Comparison {
            annotated,
            removed,
            new: Vec::new(),
            content_modified: Vec::new(),
            lock_violations: Vec::new(),
            structure_modified: Vec::new(),
            reparented: Vec::new(),
        }
    }

    /// True for the result of [`Comparison::malformed`]
    pub fn is_error(&self) -> bool {
        self.annotated.is_error_node
    }

    pub fn summary(&self, authoritative: &TreeNode) -> ComparisonSummary {
        let current_total = authoritative.node_count();
        let suggested_total = if self.is_error() {
            0
        } else {
            self.annotated.node_count()
        };
        ComparisonSummary {
            current_total,
            suggested_total,
            net_change: suggested_total as i64 - current_total as i64,
            added: self.new.len(),
            removed: self.removed.len(),
            modified: self.content_modified.len(),
            structure: self.structure_modified.len(),
            moved: self.reparented.len(),
            lock_violations: self.lock_violations.len(),
        }
    }
}

// ── Export-clean ───────────────────────────────────────────────────────

impl AnnotatedNode {
    /// Drop every annotation and keep the plain document
    pub fn into_clean(self) -> TreeNode {
        TreeNode {
            id: self.id,
            name: self.name,
            description: self.description,
            importance: self.importance,
            is_locked: self.is_locked,
            external_link: self.external_link,
            children: self
                .children
                .into_iter()
                .map(AnnotatedNode::into_clean)
                .collect(),
        }
    }
}

/// Remove annotation-only keys from a serialized tree, recursively
pub fn strip_annotations(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in ANNOTATION_KEYS {
                map.remove(key);
            }
            for child in map.values_mut() {
                strip_annotations(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_annotations),
        _ => {}
    }
}
