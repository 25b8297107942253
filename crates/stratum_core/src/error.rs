//! Error types for the core module.

use thiserror::Error;

use crate::deferred::DeferredError;
use crate::report::{NodeRef, PartialFailure};

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or realizing a resource graph.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Cannot combine an empty list of deferred values")]
    EmptyCombine,

    #[error("Resource already declared: {0}")]
    DuplicateResource(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Dependency cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Graph has already been realized; declare a new graph to run again")]
    AlreadyRealized,

    #[error("{0}")]
    PartialFailure(Box<PartialFailure>),

    #[error(
        "Run cancelled: {} resources created, {} not started",
        .completed.len(),
        .not_started.len()
    )]
    Cancelled {
        completed: Vec<NodeRef>,
        not_started: Vec<NodeRef>,
    },

    #[error("Export '{key}' is unavailable: {source}")]
    UnresolvedExport { key: String, source: DeferredError },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
