//! Error types.
//!
//! Every failure in this crate is a usage error: an id that was never issued
//! by the session or graph it is handed to. Errors are returned before any
//! state is touched, so a failed call leaves the structure exactly as it was.

use thiserror::Error;

use crate::dependency::{EdgeId, VertexId};
use crate::traversal::ContextId;

/// Errors raised by a [`Traversal`](crate::traversal::Traversal) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraversalError {
    /// The context id does not belong to this traversal.
    #[error("unknown traversal context: {0:?}")]
    UnknownContext(ContextId),
}

/// Errors raised by a [`DependencyGraph`](crate::dependency::DependencyGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The vertex id is not (or no longer) part of the graph.
    #[error("unknown vertex: {0}")]
    UnknownVertex(VertexId),

    /// The edge id is not (or no longer) part of the graph.
    #[error("unknown edge: {0}")]
    UnknownEdge(EdgeId),
}
