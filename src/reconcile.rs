//! Identity reconciliation
//!
//! Re-anchors a freshly generated candidate tree onto the authoritative
//! tree it replaces. The generator cannot be trusted with identity: ids
//! and lock flags on every matched candidate node are overwritten with the
//! authoritative values. Children are matched in two greedy passes:
//!
//! 1. by id, for candidate ids that are not placeholders
//! 2. by exact name, among authoritative children not yet claimed
//!
//! Unmatched candidate children are new and keep the id they arrived with,
//! unless that id is already owned by a matched node or by an earlier
//! unmatched one. Those get a fresh id so the result never repeats an id.
//! Unclaimed authoritative children are removals; the annotator finds them.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::node::{NodeId, TreeNode};

/// How candidate children were matched, summed over the whole tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub by_id: usize,
    pub by_name: usize,
    /// Candidate children treated as new (their subtrees are not matched)
    pub unmatched: usize,
    /// Nodes under unmatched children given a fresh id to avoid a repeat
    pub reidentified: usize,
}

impl ReconcileStats {
    pub fn matched(&self) -> usize {
        self.by_id + self.by_name
    }
}

/// Reconcile `candidate` in place against `authoritative`.
///
/// The two roots are taken as a matched pair.
pub fn reconcile(
    authoritative: &TreeNode,
    candidate: &mut TreeNode,
    config: &EngineConfig,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();
    let mut pass = Pass {
        config,
        stats: &mut stats,
        claimed: HashSet::new(),
        unmatched: Vec::new(),
    };
    pass.pair(authoritative, candidate, &mut Vec::new());

    let Pass { claimed, unmatched, .. } = pass;
    let mut seen: HashSet<NodeId> = HashSet::new();
    for path in unmatched {
        if let Some(subtree) = node_at_mut(candidate, &path) {
            stats.reidentified += dedupe(subtree, &claimed, &mut seen);
        }
    }

    debug!(
        by_id = stats.by_id,
        by_name = stats.by_name,
        unmatched = stats.unmatched,
        reidentified = stats.reidentified,
        "reconciled candidate tree"
    );
    stats
}

/// Owning form of [`reconcile`]
pub fn reconciled(
    authoritative: &TreeNode,
    mut candidate: TreeNode,
    config: &EngineConfig,
) -> TreeNode {
    reconcile(authoritative, &mut candidate, config);
    candidate
}

struct Pass<'c, 's> {
    config: &'c EngineConfig,
    stats: &'s mut ReconcileStats,
    /// Ids of every matched candidate node
    claimed: HashSet<NodeId>,
    /// Child-index paths from the root to each unmatched child
    unmatched: Vec<Vec<usize>>,
}

impl Pass<'_, '_> {
    fn pair(&mut self, auth: &TreeNode, cand: &mut TreeNode, path: &mut Vec<usize>) {
        cand.id = auth.id.clone();
        cand.is_locked = auth.is_locked;
        self.claimed.insert(auth.id.clone());

        // First occurrence wins for both tables
        let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(auth.children.len());
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (ai, child) in auth.children.iter().enumerate() {
            by_id.entry(child.id.as_str()).or_insert(ai);
            by_name.entry(child.name.as_str()).or_default().push(ai);
        }

        let mut consumed = vec![false; auth.children.len()];
        let mut matched: Vec<Option<usize>> = vec![None; cand.children.len()];

        // Pass A: identity
        for (ci, child) in cand.children.iter().enumerate() {
            if self.config.is_placeholder(child.id.as_str()) {
                continue;
            }
            if let Some(&ai) = by_id.get(child.id.as_str()) {
                if !consumed[ai] {
                    consumed[ai] = true;
                    matched[ci] = Some(ai);
                    self.stats.by_id += 1;
                    trace!(id = %child.id, "matched child by id");
                }
            }
        }

        // Pass B: name, over whatever pass A left
        for (ci, child) in cand.children.iter().enumerate() {
            if matched[ci].is_some() {
                continue;
            }
            let hit = by_name
                .get(child.name.as_str())
                .and_then(|slots| slots.iter().copied().find(|&ai| !consumed[ai]));
            if let Some(ai) = hit {
                consumed[ai] = true;
                matched[ci] = Some(ai);
                self.stats.by_name += 1;
                trace!(name = %child.name, id = %auth.children[ai].id, "matched child by name");
            }
        }

        for (ci, (child, slot)) in cand.children.iter_mut().zip(matched).enumerate() {
            path.push(ci);
            match slot {
                Some(ai) => self.pair(&auth.children[ai], child, path),
                None => {
                    self.stats.unmatched += 1;
                    self.unmatched.push(path.clone());
                    trace!(id = %child.id, name = %child.name, "unmatched child kept as new");
                }
            }
            path.pop();
        }
    }
}

fn node_at_mut<'t>(root: &'t mut TreeNode, path: &[usize]) -> Option<&'t mut TreeNode> {
    path.iter().try_fold(root, |node, &i| node.children.get_mut(i))
}

/// Regenerate ids in an unmatched subtree that repeat a claimed or
/// already seen id. Returns how many were regenerated.
fn dedupe(node: &mut TreeNode, claimed: &HashSet<NodeId>, seen: &mut HashSet<NodeId>) -> usize {
    let mut count = 0;
    if claimed.contains(&node.id) || seen.contains(&node.id) {
        let fresh = NodeId::generate();
        debug!(repeated = %node.id, id = %fresh, "reidentified repeated candidate id");
        node.id = fresh;
        count += 1;
    }
    seen.insert(node.id.clone());
    for child in &mut node.children {
        count += dedupe(child, claimed, seen);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Importance, NodeId};
    use pretty_assertions::assert_eq;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn authoritative() -> TreeNode {
        TreeNode::new("root", "Warfare").with_children(vec![
            TreeNode::new("archery", "Archery")
                .locked(true)
                .with_children(vec![TreeNode::new("arrows", "Arrows")]),
            TreeNode::new("blades", "Blades"),
            TreeNode::new("magic", "Magic").locked(true),
        ])
    }

    #[test]
    fn test_identical_copy_keeps_every_id() {
        let auth = authoritative();
        let mut cand = auth.clone();
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(cand, auth);
        assert_eq!(stats.by_id, 4);
        assert_eq!(stats.unmatched, 0);
    }

    #[test]
    fn test_lock_state_never_trusted_from_candidate() {
        let auth = authoritative();
        let mut cand = auth.clone();
        // generator unlocks a locked node and locks an unlocked one
        cand.children[0].is_locked = false;
        cand.children[1].is_locked = true;
        cand.is_locked = true;
        reconcile(&auth, &mut cand, &config());
        assert!(cand.children[0].is_locked);
        assert!(!cand.children[1].is_locked);
        assert!(!cand.is_locked);
    }

    #[test]
    fn test_root_identity_forced() {
        let auth = authoritative();
        let mut cand = TreeNode::new("something-else", "Warfare v2");
        reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.id, auth.id);
        assert_eq!(cand.name, "Warfare v2");
    }

    #[test]
    fn test_name_match_recovers_lost_ids() {
        let auth = authoritative();
        let mut cand = TreeNode::new("root", "Warfare").with_children(vec![
            TreeNode::with_fresh_id("Blades"),
            TreeNode::new("NEW_NODE", "Archery")
                .with_children(vec![TreeNode::with_fresh_id("Arrows")]),
        ]);
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].id.as_str(), "blades");
        assert_eq!(cand.children[1].id.as_str(), "archery");
        assert!(cand.children[1].is_locked);
        assert_eq!(cand.children[1].children[0].id.as_str(), "arrows");
        assert_eq!(stats.by_name, 3);
    }

    #[test]
    fn test_placeholder_id_skips_identity_pass() {
        let auth = TreeNode::new("r", "R").with_children(vec![TreeNode::new("NEW_NODE", "Odd")]);
        let mut cand =
            TreeNode::new("r", "R").with_children(vec![TreeNode::new("NEW_NODE", "Other")]);
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(stats.by_id, 0);
        assert_eq!(stats.unmatched, 1);
    }

    #[test]
    fn test_unmatched_child_untouched() {
        let auth = authoritative();
        let mut cand = auth.clone();
        let newcomer = TreeNode::new("fresh-1", "Siege Craft").locked(true);
        cand.children.push(newcomer.clone());
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[3], newcomer);
        assert_eq!(stats.unmatched, 1);
    }

    #[test]
    fn test_one_authoritative_child_claimed_once_by_name() {
        let auth = TreeNode::new("r", "R").with_children(vec![TreeNode::new("w", "Wings")]);
        let mut cand = TreeNode::new("r", "R").with_children(vec![
            TreeNode::with_fresh_id("Wings"),
            TreeNode::new("second", "Wings"),
        ]);
        reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].id.as_str(), "w");
        assert_eq!(cand.children[1].id.as_str(), "second");
    }

    #[test]
    fn test_id_claim_beats_earlier_name_candidate() {
        // first candidate child shares the name, second carries the real id
        let auth = TreeNode::new("r", "R").with_children(vec![TreeNode::new("w", "Wings")]);
        let mut cand = TreeNode::new("r", "R").with_children(vec![
            TreeNode::new("x1", "Wings"),
            TreeNode::new("w", "Renamed"),
        ]);
        reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].id.as_str(), "x1");
        assert_eq!(cand.children[1].id.as_str(), "w");
    }

    #[test]
    fn test_duplicate_candidate_ids_second_falls_back_to_name() {
        let auth = TreeNode::new("r", "R").with_children(vec![
            TreeNode::new("a", "Alpha"),
            TreeNode::new("b", "Beta"),
        ]);
        let mut cand = TreeNode::new("r", "R").with_children(vec![
            TreeNode::new("a", "Alpha"),
            TreeNode::new("a", "Beta"),
        ]);
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[1].id.as_str(), "b");
        assert_eq!(stats.by_id, 1);
        assert_eq!(stats.by_name, 1);
    }

    #[test]
    fn test_repeated_sibling_id_gets_fresh_identity() {
        let auth = TreeNode::new("r", "R").with_children(vec![TreeNode::new("a", "Alpha")]);
        let mut cand = TreeNode::new("r", "R").with_children(vec![
            TreeNode::new("a", "Alpha"),
            TreeNode::new("a", "Brand New").with_children(vec![TreeNode::new("r", "Echo")]),
        ]);
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].id.as_str(), "a");
        assert_ne!(cand.children[1].id.as_str(), "a");
        assert_ne!(cand.children[1].children[0].id.as_str(), "r");
        assert_eq!(stats.reidentified, 2);
        assert!(crate::index::TreeIndex::build(&cand).duplicate_ids().is_empty());
    }

    #[test]
    fn test_id_claimed_in_another_branch_is_reidentified() {
        let auth = authoritative();
        // "arrows" is kept under archery and copied under blades
        let mut cand = auth.clone();
        let copy = TreeNode::new("arrows", "Arrows");
        cand.children[1].children.push(copy);
        let stats = reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].children[0].id.as_str(), "arrows");
        assert_ne!(cand.children[1].children[0].id.as_str(), "arrows");
        assert_eq!(stats.reidentified, 1);
    }

    #[test]
    fn test_two_unmatched_copies_keep_one_id() {
        let auth = TreeNode::new("r", "R");
        let mut cand = TreeNode::new("r", "R").with_children(vec![
            TreeNode::new("x", "One"),
            TreeNode::new("x", "Two"),
        ]);
        reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].id.as_str(), "x");
        assert_ne!(cand.children[1].id.as_str(), "x");
    }

    #[test]
    fn test_matching_is_per_parent() {
        // "arrows" moved under blades: not a child of the matched parent
        let auth = authoritative();
        let mut cand = TreeNode::new("root", "Warfare").with_children(vec![
            TreeNode::new("archery", "Archery").locked(false),
            TreeNode::new("blades", "Blades")
                .with_children(vec![TreeNode::new("arrows", "Arrows").locked(true)]),
        ]);
        let stats = reconcile(&auth, &mut cand, &config());
        let moved = &cand.children[1].children[0];
        assert_eq!(moved.id.as_str(), "arrows");
        assert!(moved.is_locked, "unmatched nodes keep their own flags");
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.reidentified, 0);
    }

    #[test]
    fn test_content_is_left_to_the_annotator() {
        let auth = authoritative();
        let mut cand = auth.clone();
        cand.children[0].name = String::from("Longbows");
        cand.children[0].importance = Importance::Major;
        reconcile(&auth, &mut cand, &config());
        assert_eq!(cand.children[0].name, "Longbows");
        assert_eq!(cand.children[0].importance, Importance::Major);
    }

    #[test]
    fn test_reconciled_owning_form() {
        let auth = authoritative();
        let cand = TreeNode::new("zz", "Warfare");
        assert_eq!(reconciled(&auth, cand, &config()).id, NodeId::from("root"));
    }
}
