//! Error types
//!
//! Only malformed input is an error. Lock violations are classifications
//! and edits against a missing node are no-ops.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Candidate document failed minimal shape validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Input text is not JSON at all
    #[error("candidate is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("{path}: expected a node object")]
    NotAnObject { path: String },

    #[error("{path}: node has no string `name`")]
    MissingName { path: String },

    #[error("{path}: `children` must be an array")]
    ChildrenNotASequence { path: String },

    /// Top-level array with nothing in it, or wrapping disabled
    #[error("candidate is an array of nodes; expected a single root object")]
    UnexpectedRootArray,
}

impl ShapeError {
    /// Location of the offending value, `$` for the document root
    pub fn path(&self) -> Option<&str> {
        match self {
            ShapeError::NotAnObject { path }
            | ShapeError::MissingName { path }
            | ShapeError::ChildrenNotASequence { path } => Some(path),
            ShapeError::InvalidJson(_) | ShapeError::UnexpectedRootArray => None,
        }
    }
}
