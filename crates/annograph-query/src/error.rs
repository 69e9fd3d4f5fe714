//! Error types for the annograph-query crate.

use annograph_core::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Edge ({start})-[{label}]->({end}) references node {missing}, which is not in the node set")]
    DanglingEdgeReference {
        start: NodeId,
        label: String,
        end: NodeId,
        missing: NodeId,
    },

    #[error("Nothing to match: the graph has no nodes")]
    EmptyPattern,
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template {gid}: placeholder {{{index}}} has no input (only {available} given)")]
    MissingInput {
        gid: String,
        index: usize,
        available: usize,
    },

    #[error("Template {gid}: malformed placeholder at byte {position}")]
    Malformed { gid: String, position: usize },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the database boundary. Carries the underlying
/// message; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Query failed: {0}")]
    Failed(String),
}
