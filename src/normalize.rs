//! Node normalizer and candidate parser
//!
//! Turns untrusted, loosely-typed documents into well-formed [`TreeNode`]s.
//! Every field falls back to its default when missing or of the wrong type;
//! placeholder ids are replaced with fresh ones. [`parse`] adds the shape
//! check that decides whether a candidate may be trusted at all.
//!
//! Author: Moroya Sakamoto

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ShapeError;
use crate::node::{ExternalLink, Importance, NodeId, TreeNode};

const WRAPPER_DESCRIPTION: &str =
    "Several root nodes were suggested; this wrapper was added automatically.";

// ── Normalization ──────────────────────────────────────────────────────

/// Normalize one untrusted value and its subtree.
///
/// Returns `None` when `raw` is not an object. Children that are not
/// objects are dropped rather than padded. `parent_id` is the id of the
/// node this one will hang under (`None` for a root).
pub fn normalize(
    raw: &Value,
    parent_id: Option<&NodeId>,
    config: &EngineConfig,
) -> Option<TreeNode> {
    let obj = raw.as_object()?;

    let id = match obj.get("id").and_then(Value::as_str) {
        Some(id) if !config.is_placeholder(id) => NodeId::from(id),
        other => {
            let fresh = NodeId::generate();
            debug!(
                parent = parent_id.map(NodeId::as_str),
                given = other,
                id = %fresh,
                "assigned fresh node id"
            );
            fresh
        }
    };

    let name = match obj.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => String::from(name),
        _ => config.default_name.clone(),
    };

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_default();

    let importance = obj
        .get("importance")
        .and_then(Value::as_str)
        .and_then(Importance::parse)
        .unwrap_or_default();

    let is_locked = obj.get("isLocked").and_then(Value::as_bool).unwrap_or(false);

    let external_link = read_link(obj);

    let children = match obj.get("children").and_then(Value::as_array) {
        Some(items) => {
            let mut children = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match normalize(item, Some(&id), config) {
                    Some(child) => children.push(child),
                    None => debug!(parent = %id, index, "dropped non-object child"),
                }
            }
            children
        }
        None => Vec::new(),
    };

    Some(TreeNode {
        id,
        name,
        description,
        importance,
        is_locked,
        children,
        external_link,
    })
}

/// `externalLink: {targetId, targetName}`, or the flat
/// `linkedProjectId`/`linkedProjectName` pair older documents carry
fn read_link(obj: &Map<String, Value>) -> Option<ExternalLink> {
    let nested = obj.get("externalLink").and_then(Value::as_object);
    let (target_id, target_name) = match nested {
        Some(link) => (link.get("targetId"), link.get("targetName")),
        None => (obj.get("linkedProjectId"), obj.get("linkedProjectName")),
    };
    match (
        target_id.and_then(Value::as_str),
        target_name.and_then(Value::as_str),
    ) {
        (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => {
            Some(ExternalLink::new(id, name))
        }
        _ => None,
    }
}

/// New node with a fresh id, as if a user had just authored it
pub fn fresh_node(name: &str, description: &str, config: &EngineConfig) -> TreeNode {
    let name = if name.trim().is_empty() {
        config.default_name.as_str()
    } else {
        name
    };
    TreeNode::with_fresh_id(name).with_description(description)
}

/// Copy of `node` with every id in the subtree regenerated
pub fn reidentify(node: &TreeNode) -> TreeNode {
    TreeNode {
        id: NodeId::generate(),
        children: node.children.iter().map(reidentify).collect(),
        ..node.clone_shallow()
    }
}

// ── Shape validation ───────────────────────────────────────────────────

fn check_shape(raw: &Value, path: &str) -> Result<(), ShapeError> {
    let obj = raw.as_object().ok_or_else(|| ShapeError::NotAnObject {
        path: String::from(path),
    })?;
    if !obj.get("name").is_some_and(Value::is_string) {
        return Err(ShapeError::MissingName {
            path: String::from(path),
        });
    }
    match obj.get("children") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_shape(item, &format!("{path}.children[{i}]"))?;
            }
            Ok(())
        }
        Some(_) => Err(ShapeError::ChildrenNotASequence {
            path: String::from(path),
        }),
    }
}

/// Validate the shape of a single-root document, then normalize it.
pub fn parse(raw: &Value, config: &EngineConfig) -> Result<TreeNode, ShapeError> {
    check_shape(raw, "$")?;
    normalize(raw, None, config).ok_or_else(|| ShapeError::NotAnObject {
        path: String::from("$"),
    })
}

/// Parse a generated candidate against the tree it is meant to replace.
///
/// A top-level array of valid nodes is wrapped in a synthetic root named
/// after `authoritative` when [`EngineConfig::wrap_multi_root`] is set.
pub fn parse_candidate(
    raw: &Value,
    authoritative: &TreeNode,
    config: &EngineConfig,
) -> Result<TreeNode, ShapeError> {
    let items = match raw.as_array() {
        Some(items) => items,
        None => return parse(raw, config),
    };
    if !config.wrap_multi_root || items.is_empty() {
        return Err(ShapeError::UnexpectedRootArray);
    }
    for (i, item) in items.iter().enumerate() {
        check_shape(item, &format!("$[{i}]"))?;
    }

    let mut wrapper = TreeNode::with_fresh_id(&format!(
        "{}{}",
        authoritative.name, config.wrapper_suffix
    ))
    .with_description(WRAPPER_DESCRIPTION);
    wrapper.external_link = authoritative.external_link.clone();
    wrapper.children = items
        .iter()
        .filter_map(|item| normalize(item, Some(&wrapper.id), config))
        .collect();
    debug!(roots = items.len(), "wrapped multi-root candidate");
    Ok(wrapper)
}

/// [`parse_candidate`] over JSON text
pub fn parse_candidate_str(
    text: &str,
    authoritative: &TreeNode,
    config: &EngineConfig,
) -> Result<TreeNode, ShapeError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| ShapeError::InvalidJson(e.to_string()))?;
    parse_candidate(&raw, authoritative, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_non_object_is_none() {
        assert!(normalize(&json!("text"), None, &config()).is_none());
        assert!(normalize(&json!(null), None, &config()).is_none());
        assert!(normalize(&json!([1, 2]), None, &config()).is_none());
    }

    #[test]
    fn test_defaults_filled() {
        let node = normalize(&json!({ "id": "a", "name": "Archery" }), None, &config()).unwrap();
        assert_eq!(node, TreeNode::new("a", "Archery"));
    }

    #[test]
    fn test_valid_fields_kept() {
        let raw = json!({
            "id": "a",
            "name": "Archery",
            "description": "Longbows",
            "importance": "major",
            "isLocked": true,
            "externalLink": { "targetId": "p2", "targetName": "Nature" }
        });
        let node = normalize(&raw, None, &config()).unwrap();
        assert_eq!(node.description, "Longbows");
        assert_eq!(node.importance, Importance::Major);
        assert!(node.is_locked);
        assert_eq!(node.external_link, Some(ExternalLink::new("p2", "Nature")));
    }

    #[test]
    fn test_wrong_types_fall_back() {
        let raw = json!({
            "id": 42,
            "name": ["x"],
            "description": 7,
            "importance": "legendary",
            "isLocked": "true",
            "children": "none"
        });
        let node = normalize(&raw, None, &config()).unwrap();
        assert_ne!(node.id.as_str(), "42");
        assert_eq!(node.name, "Untitled");
        assert_eq!(node.description, "");
        assert_eq!(node.importance, Importance::Common);
        assert!(!node.is_locked);
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_placeholder_id_replaced() {
        let node = normalize(&json!({ "id": "NEW_NODE", "name": "n" }), None, &config()).unwrap();
        assert_ne!(node.id.as_str(), "NEW_NODE");
        assert!(!node.id.as_str().is_empty());
    }

    #[test]
    fn test_missing_id_generated_and_unique() {
        let raw = json!({ "name": "r", "children": [{ "name": "a" }, { "name": "b" }] });
        let node = normalize(&raw, None, &config()).unwrap();
        assert_ne!(node.children[0].id, node.children[1].id);
        assert_ne!(node.id, node.children[0].id);
    }

    #[test]
    fn test_blank_name_repaired() {
        let node = normalize(&json!({ "id": "a", "name": "   " }), None, &config()).unwrap();
        assert_eq!(node.name, "Untitled");
    }

    #[test]
    fn test_non_object_children_dropped_not_padded() {
        let raw = json!({
            "id": "r",
            "name": "R",
            "children": [{ "id": "a", "name": "A" }, 3, null, { "id": "b", "name": "B" }]
        });
        let node = normalize(&raw, None, &config()).unwrap();
        let ids: Vec<&str> = node.child_ids().map(NodeId::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_legacy_link_keys() {
        let raw = json!({
            "id": "a",
            "name": "A",
            "linkedProjectId": "p9",
            "linkedProjectName": "Elven Warfare"
        });
        let node = normalize(&raw, None, &config()).unwrap();
        assert_eq!(
            node.external_link,
            Some(ExternalLink::new("p9", "Elven Warfare"))
        );
    }

    #[test]
    fn test_half_link_ignored() {
        let raw = json!({
            "id": "a",
            "name": "A",
            "linkedProjectId": "p9",
            "linkedProjectName": null
        });
        assert!(normalize(&raw, None, &config()).unwrap().external_link.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        let err = parse(&json!({ "id": "a" }), &config()).unwrap_err();
        assert_eq!(err, ShapeError::MissingName { path: String::from("$") });
    }

    #[test]
    fn test_parse_rejects_bad_children_deep() {
        let raw = json!({
            "name": "R",
            "children": [{ "name": "A" }, { "name": "B", "children": { "oops": true } }]
        });
        let err = parse(&raw, &config()).unwrap_err();
        assert_eq!(
            err,
            ShapeError::ChildrenNotASequence {
                path: String::from("$.children[1]")
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_object_child() {
        let raw = json!({ "name": "R", "children": ["A"] });
        assert_eq!(
            parse(&raw, &config()).unwrap_err(),
            ShapeError::NotAnObject {
                path: String::from("$.children[0]")
            }
        );
    }

    #[test]
    fn test_parse_accepts_null_children() {
        let node = parse(&json!({ "id": "r", "name": "R", "children": null }), &config()).unwrap();
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_candidate_array_wrapped() {
        let auth = TreeNode::new("root", "Warfare").with_link(ExternalLink::new("p2", "Magic"));
        let raw = json!([{ "id": "a", "name": "A" }, { "id": "b", "name": "B" }]);
        let node = parse_candidate(&raw, &auth, &config()).unwrap();
        assert_eq!(node.name, "Warfare (Wrapped Multi-Root)");
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.external_link, auth.external_link);
    }

    #[test]
    fn test_candidate_array_rejected_when_disabled() {
        let auth = TreeNode::new("root", "Warfare");
        let config = EngineConfig {
            wrap_multi_root: false,
            ..EngineConfig::default()
        };
        let raw = json!([{ "name": "A" }]);
        assert_eq!(
            parse_candidate(&raw, &auth, &config).unwrap_err(),
            ShapeError::UnexpectedRootArray
        );
    }

    #[test]
    fn test_candidate_empty_array_rejected() {
        let auth = TreeNode::new("root", "Warfare");
        assert_eq!(
            parse_candidate(&json!([]), &auth, &config()).unwrap_err(),
            ShapeError::UnexpectedRootArray
        );
    }

    #[test]
    fn test_candidate_array_with_bad_item() {
        let auth = TreeNode::new("root", "Warfare");
        let raw = json!([{ "name": "A" }, { "id": "x" }]);
        assert_eq!(
            parse_candidate(&raw, &auth, &config()).unwrap_err(),
            ShapeError::MissingName {
                path: String::from("$[1]")
            }
        );
    }

    #[test]
    fn test_candidate_str_invalid_json() {
        let auth = TreeNode::new("root", "Warfare");
        let err = parse_candidate_str("{ not json", &auth, &config()).unwrap_err();
        assert!(matches!(err, ShapeError::InvalidJson(_)));
    }

    #[test]
    fn test_fresh_node_repairs_blank_name() {
        let node = fresh_node("", "desc", &config());
        assert_eq!(node.name, "Untitled");
        assert_eq!(node.description, "desc");
    }

    #[test]
    fn test_reidentify_keeps_content_changes_every_id() {
        let original = TreeNode::new("r", "R").with_children(vec![
            TreeNode::new("a", "A").locked(true),
            TreeNode::new("b", "B").with_children(vec![TreeNode::new("c", "C")]),
        ]);
        let copy = reidentify(&original);
        assert_eq!(copy.node_count(), original.node_count());
        for (old, new) in original.iter().zip(copy.iter()) {
            assert_ne!(old.id, new.id);
            assert_eq!(old.name, new.name);
            assert_eq!(old.is_locked, new.is_locked);
        }
    }
}
