//! ALICE-Arbor — Tree Reconciliation & Change Review
//!
//! Don't trust the generator, re-anchor its tree.
//!
//! Identity-preserving reconciliation and change annotation for
//! hierarchical documents rewritten by an untrusted producer:
//! - Lenient normalization with a strict fail-closed shape check
//! - Two-pass id-then-name identity matching, lock flags never trusted
//! - Per-node change classification with lock violation reporting
//! - Copy-on-write edit primitives for manual changes
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`node`] | Tree document model and whole-tree queries |
//! | [`error`] | Shape errors for malformed candidates |
//! | [`config`] | Explicit engine configuration (placeholder ids, repairs) |
//! | [`normalize`] | Untrusted value → [`TreeNode`], candidate parsing |
//! | [`index`] | Flat id → (node, parent) lookup and ancestor walks |
//! | [`edit`] | Copy-on-write structural mutation primitives |
//! | [`reconcile`] | Id/lock re-anchoring of a candidate onto the current tree |
//! | [`annotate`] | Change status, details and classification buckets |
//! | [`review`] | End-to-end compare, fail-closed error result, export-clean |
//!
//! # Quick Start
//!
//! ```
//! use alice_arbor::{compare, ChangeStatus, EngineConfig, TreeNode};
//! use serde_json::json;
//!
//! let current = TreeNode::new("root", "Warfare")
//!     .with_children(vec![TreeNode::new("engine", "Engine").locked(true)]);
//!
//! // Generator dropped every id and rewrote a locked node
//! let candidate = json!({
//!     "name": "Warfare",
//!     "children": [{ "name": "Engine", "description": "Now with turbines" }]
//! });
//!
//! let cmp = compare(&current, &candidate, &EngineConfig::default());
//! assert!(cmp.has_lock_violations());
//! assert_eq!(
//!     cmp.annotated.find("engine").unwrap().change_status,
//!     ChangeStatus::LockedContentChanged,
//! );
//! ```
//!
//! Author: Moroya Sakamoto

pub mod annotate;
pub mod config;
pub mod edit;
pub mod error;
pub mod index;
pub mod node;
pub mod normalize;
pub mod reconcile;
pub mod review;

pub use annotate::{
    annotate, AnnotatedNode, ChangeDetail, ChangeField, ChangeStatus, Comparison, LockViolation,
    LockViolationKind, NodeRef, RemovedSubtree, Severity,
};
pub use config::EngineConfig;
pub use edit::{
    add_child, remove_subtree, set_lock_all, splice_foreign_subtree, toggle_lock,
    update_all_direct_children, update_node, NodeUpdate,
};
pub use error::ShapeError;
pub use index::{ancestor_path, AncestorPath, IndexEntry, TreeIndex};
pub use node::{ExternalLink, Importance, ImportanceCounts, NodeId, TreeNode};
pub use normalize::{
    fresh_node, normalize, parse, parse_candidate, parse_candidate_str, reidentify,
};
pub use reconcile::{reconcile, reconciled, ReconcileStats};
pub use review::{accept, compare, compare_str, strip_annotations, ComparisonSummary};
