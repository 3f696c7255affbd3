//! Graph Edges
//!
//! An edge links a dependency (the source) to a dependent (the sink) and
//! carries the action to run when the source resolves. Edges are stored once,
//! in the graph's edge table; vertices only hold edge ids.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::graph::DependencyGraph;
use super::vertex::{ResolutionPolicy, VertexId};
use crate::error::GraphError;

/// Unique identifier for an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(u64);

impl EdgeId {
    /// Generate a new unique edge ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback run when an edge fires.
///
/// Receives the graph, the source and the sink. The graph is borrowed
/// mutably so the action can resolve the sink and keep the cascade going.
pub type EdgeAction<P> =
    Box<dyn FnOnce(&mut DependencyGraph<P>, VertexId, VertexId) -> Result<(), GraphError>>;

/// A directed `source -> sink` edge.
pub struct Edge<P> {
    id: EdgeId,
    source: VertexId,
    sink: VertexId,

    /// `None` once the edge has fired.
    action: Option<EdgeAction<P>>,
}

impl<P> Edge<P> {
    pub(crate) fn new(source: VertexId, sink: VertexId, action: EdgeAction<P>) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            sink,
            action: Some(action),
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The dependency.
    pub fn source(&self) -> VertexId {
        self.source
    }

    /// The dependent.
    pub fn sink(&self) -> VertexId {
        self.sink
    }

    /// Check whether the edge has already fired.
    pub fn is_fired(&self) -> bool {
        self.action.is_none()
    }

    /// Take the action out, marking the edge fired.
    pub(crate) fn take_action(&mut self) -> Option<EdgeAction<P>> {
        self.action.take()
    }
}

impl<P> fmt::Debug for Edge<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("sink", &self.sink)
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// Edge action that resolves the sink once it is ready.
///
/// When the edge fires, the sink's policy is asked whether it can resolve.
/// If so, `compute` produces the result from the graph and the sink id, and
/// the sink is resolved, which fires its own dependents in turn.
pub fn resolve_when_ready<P, F>(
    compute: F,
) -> impl FnOnce(&mut DependencyGraph<P>, VertexId, VertexId) -> Result<(), GraphError>
where
    P: ResolutionPolicy,
    F: FnOnce(&DependencyGraph<P>, VertexId) -> P::Output,
{
    move |graph: &mut DependencyGraph<P>, _source: VertexId, sink: VertexId| {
        if graph.can_resolve(sink)? {
            let result = compute(graph, sink);
            graph.resolve(sink, result)?;
        }
        Ok(())
    }
}
