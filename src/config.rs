//! Engine configuration
//!
//! Passed explicitly to every entry point that needs it; the engine keeps
//! no process-wide state.
//!
//! Author: Moroya Sakamoto

use serde::{Deserialize, Serialize};

/// Sentinel ids the generator emits for nodes it authored itself
pub const DEFAULT_PLACEHOLDER_IDS: &[&str] =
    &["NEW_NODE", "NEW_NODE_ROOT_WRAPPER", "auto-gen-if-new"];

/// Name given to nodes that arrive with a blank name
pub const DEFAULT_NODE_NAME: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Ids that mean "newly authored, do not match by id"
    pub placeholder_ids: Vec<String>,
    /// Replacement for blank names
    pub default_name: String,
    /// Accept a top-level array of nodes by wrapping it in a synthetic root
    pub wrap_multi_root: bool,
    /// Appended to the authoritative root name to label the synthetic root
    pub wrapper_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placeholder_ids: DEFAULT_PLACEHOLDER_IDS
                .iter()
                .map(|s| String::from(*s))
                .collect(),
            default_name: String::from(DEFAULT_NODE_NAME),
            wrap_multi_root: true,
            wrapper_suffix: String::from(" (Wrapped Multi-Root)"),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON document; absent keys keep their defaults
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// True for ids that carry no identity: empty, whitespace, or a sentinel
    pub fn is_placeholder(&self, id: &str) -> bool {
        let id = id.trim();
        id.is_empty() || self.placeholder_ids.iter().any(|p| p == id)
    }
}
