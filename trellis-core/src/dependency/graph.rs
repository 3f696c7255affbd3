//! Dependency Graph
//!
//! The graph owns every vertex and every edge. An edge is stored once, in the
//! edge table, and both of its endpoints refer to it by id, so connecting or
//! disconnecting always updates the two sides together.
//!
//! # Firing
//!
//! [`DependencyGraph::fire_resolved`] takes a snapshot of a vertex's incoming
//! edges and fires them in insertion order. For each edge that is still in
//! the graph and has not fired yet:
//!
//! 1. the action is taken out of the edge, which marks it fired;
//! 2. the sink's policy hears about it (`dependency_fired`);
//! 3. the action runs with the graph borrowed mutably, so it can resolve the
//!    sink and cascade further.
//!
//! An action that fails stops the pass and its error is returned. Edges that
//! were not reached stay unfired and go out on the next call.
//!
//! Cascades run from a work queue, not the call stack. When an action
//! resolves (or fires) another vertex while a pass is running, that vertex is
//! queued and the call returns right away; the outermost call drains the
//! queue in arrival order. Resolution therefore spreads breadth first, and a
//! chain of any length resolves in constant stack depth.

use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::edge::{Edge, EdgeAction, EdgeId};
use super::vertex::{ResolutionPolicy, Vertex, VertexId};
use crate::error::GraphError;

/// Edge ids copied out of a vertex before the graph is mutated.
type EdgeSnapshot = SmallVec<[EdgeId; 8]>;

/// A mutable graph of vertices linked by "depends on" edges.
pub struct DependencyGraph<P> {
    /// All vertices, indexed by ID, in insertion order.
    vertices: IndexMap<VertexId, Vertex<P>>,

    /// All edges, indexed by ID, in insertion order.
    edges: IndexMap<EdgeId, Edge<P>>,

    /// Set while a firing pass is draining `pending`.
    firing: bool,

    /// Resolved vertices whose edges are waiting to fire.
    pending: VecDeque<VertexId>,
}

impl<P> DependencyGraph<P>
where
    P: ResolutionPolicy,
{
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            vertices: IndexMap::new(),
            edges: IndexMap::new(),
            firing: false,
            pending: VecDeque::new(),
        }
    }

    /// Add a standalone vertex carrying `policy`.
    pub fn add_vertex(&mut self, policy: P) -> VertexId {
        let vertex = Vertex::new(policy);
        let id = vertex.id();
        self.vertices.insert(id, vertex);
        id
    }

    /// Disconnect a vertex, remove it, and hand back its policy.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<P, GraphError> {
        let removed = self.disconnect(id)?;
        let vertex = self
            .vertices
            .shift_remove(&id)
            .ok_or(GraphError::UnknownVertex(id))?;
        debug!(vertex = id.raw(), edges = removed, "removed vertex");
        Ok(vertex.into_policy())
    }

    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Get a reference to a vertex.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex<P>> {
        self.vertices.get(&id)
    }

    /// Get a handle for mutating a vertex and its edges.
    pub fn vertex_mut(&mut self, id: VertexId) -> Option<VertexMut<'_, P>> {
        if !self.vertices.contains_key(&id) {
            return None;
        }
        Some(VertexMut { graph: self, id })
    }

    /// Get a vertex's policy.
    pub fn policy(&self, id: VertexId) -> Option<&P> {
        self.vertices.get(&id).map(Vertex::policy)
    }

    pub fn policy_mut(&mut self, id: VertexId) -> Option<&mut P> {
        self.vertices.get_mut(&id).map(Vertex::policy_mut)
    }

    /// Get a reference to an edge.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge<P>> {
        self.edges.get(&id)
    }

    /// Iterate over vertex IDs in insertion order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys().copied()
    }

    /// Get the total number of vertices in the graph.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the total number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn get(&self, id: VertexId) -> Result<&Vertex<P>, GraphError> {
        self.vertices.get(&id).ok_or(GraphError::UnknownVertex(id))
    }

    fn get_mut(&mut self, id: VertexId) -> Result<&mut Vertex<P>, GraphError> {
        self.vertices.get_mut(&id).ok_or(GraphError::UnknownVertex(id))
    }

    /// Make `sink` depend on `source`.
    ///
    /// The new edge is registered with both endpoints. `action` runs once,
    /// when the edge fires.
    pub fn depends_on<F>(
        &mut self,
        sink: VertexId,
        source: VertexId,
        action: F,
    ) -> Result<EdgeId, GraphError>
    where
        F: FnOnce(&mut DependencyGraph<P>, VertexId, VertexId) -> Result<(), GraphError> + 'static,
    {
        self.connect(sink, source, Box::new(action))
    }

    /// Same as [`depends_on`](Self::depends_on) for an already boxed action.
    pub fn connect(
        &mut self,
        sink: VertexId,
        source: VertexId,
        action: EdgeAction<P>,
    ) -> Result<EdgeId, GraphError> {
        // Check both endpoints before touching either.
        self.get(source)?;
        self.get(sink)?;

        let edge = Edge::new(source, sink, action);
        let edge_id = edge.id();
        self.edges.insert(edge_id, edge);

        self.get_mut(source)?.indegrees.insert(edge_id);
        let sink_vertex = self.get_mut(sink)?;
        sink_vertex.outdegrees.insert(edge_id);
        sink_vertex.policy.dependency_added();

        trace!(edge = edge_id.raw(), source = source.raw(), sink = sink.raw(), "connected edge");
        Ok(edge_id)
    }

    /// Remove every edge from `source` to `sink`.
    ///
    /// Returns how many edges were removed; zero is not an error.
    pub fn undepends_on(&mut self, sink: VertexId, source: VertexId) -> Result<usize, GraphError> {
        self.get(source)?;
        let matching: EdgeSnapshot = self
            .get(sink)?
            .outdegrees
            .iter()
            .copied()
            .filter(|edge_id| {
                self.edges
                    .get(edge_id)
                    .is_some_and(|edge| edge.source() == source)
            })
            .collect();

        Ok(self.detach_all(matching))
    }

    /// Remove every edge touching `id`, incoming and outgoing.
    ///
    /// Returns how many edges were removed.
    pub fn disconnect(&mut self, id: VertexId) -> Result<usize, GraphError> {
        let vertex = self.get(id)?;
        let touching: EdgeSnapshot = vertex
            .indegrees
            .iter()
            .chain(vertex.outdegrees.iter())
            .copied()
            .collect();

        Ok(self.detach_all(touching))
    }

    /// Remove a single edge.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(), GraphError> {
        self.detach(id).map(|_| ()).ok_or(GraphError::UnknownEdge(id))
    }

    fn detach_all(&mut self, edge_ids: EdgeSnapshot) -> usize {
        edge_ids
            .into_iter()
            .filter_map(|edge_id| self.detach(edge_id))
            .count()
    }

    /// Remove an edge from the table and from both endpoints.
    fn detach(&mut self, edge_id: EdgeId) -> Option<Edge<P>> {
        let edge = self.edges.shift_remove(&edge_id)?;

        if let Some(source) = self.vertices.get_mut(&edge.source()) {
            source.indegrees.shift_remove(&edge_id);
        }
        if let Some(sink) = self.vertices.get_mut(&edge.sink()) {
            sink.outdegrees.shift_remove(&edge_id);
            sink.policy.dependency_removed(edge.is_fired());
        }

        trace!(
            edge = edge_id.raw(),
            source = edge.source().raw(),
            sink = edge.sink().raw(),
            "disconnected edge"
        );
        Some(edge)
    }

    /// Vertices that depend on `id`, in edge insertion order.
    pub fn adjacency_set(&self, id: VertexId) -> Result<Vec<VertexId>, GraphError> {
        Ok(self
            .get(id)?
            .indegrees
            .iter()
            .filter_map(|edge_id| self.edges.get(edge_id).map(Edge::sink))
            .collect())
    }

    /// Vertices `id` depends on, in edge insertion order.
    pub fn dependency_set(&self, id: VertexId) -> Result<Vec<VertexId>, GraphError> {
        Ok(self
            .get(id)?
            .outdegrees
            .iter()
            .filter_map(|edge_id| self.edges.get(edge_id).map(Edge::source))
            .collect())
    }

    /// Fire every incoming edge of `id` that has not fired yet.
    ///
    /// Returns the number of edges fired by this call, including the edges of
    /// every vertex resolved along the way. Called from inside an edge action,
    /// the vertex is only queued behind the running pass and `0` is returned.
    pub fn fire_resolved(&mut self, id: VertexId) -> Result<usize, GraphError> {
        self.get(id)?;
        self.pending.push_back(id);
        if self.firing {
            trace!(vertex = id.raw(), queued = self.pending.len(), "queued vertex");
            return Ok(0);
        }

        self.firing = true;
        let outcome = self.drain_pending();
        self.firing = false;
        // A failed pass abandons whatever it had queued.
        self.pending.clear();
        outcome
    }

    fn drain_pending(&mut self) -> Result<usize, GraphError> {
        let mut fired = 0;
        while let Some(id) = self.pending.pop_front() {
            fired += self.fire_edges(id)?;
        }
        Ok(fired)
    }

    /// Fire the unfired incoming edges of one vertex, in insertion order.
    fn fire_edges(&mut self, id: VertexId) -> Result<usize, GraphError> {
        // The vertex may have been removed while it sat in the queue.
        let Some(vertex) = self.vertices.get(&id) else {
            return Ok(0);
        };
        let snapshot: EdgeSnapshot = vertex.indegrees.iter().copied().collect();
        let mut fired = 0;

        for edge_id in snapshot {
            // An earlier action may have removed the edge.
            let Some(edge) = self.edges.get_mut(&edge_id) else {
                continue;
            };
            let Some(action) = edge.take_action() else {
                continue;
            };
            let (source, sink) = (edge.source(), edge.sink());

            if let Some(vertex) = self.vertices.get_mut(&sink) {
                vertex.policy.dependency_fired();
            }
            trace!(edge = edge_id.raw(), source = source.raw(), sink = sink.raw(), "firing edge");
            fired += 1;

            action(self, source, sink)?;
        }

        Ok(fired)
    }

    /// Ask the vertex's policy whether it is ready.
    pub fn can_resolve(&self, id: VertexId) -> Result<bool, GraphError> {
        Ok(self.get(id)?.policy.can_resolve())
    }

    /// Hand `result` to the vertex's policy, then fire its dependents.
    ///
    /// Inside an edge action the dependents are queued behind the running
    /// pass instead; see [`fire_resolved`](Self::fire_resolved).
    pub fn resolve(&mut self, id: VertexId, result: P::Output) -> Result<(), GraphError> {
        self.get_mut(id)?.policy.resolve(result);
        debug!(vertex = id.raw(), "resolved vertex");
        self.fire_resolved(id)?;
        Ok(())
    }

    /// Display a vertex along with the ids it depends on.
    pub fn describe(&self, id: VertexId) -> Option<VertexDisplay<'_, P>> {
        self.vertices.get(&id).map(|vertex| VertexDisplay { graph: self, vertex })
    }
}

impl<P> Default for DependencyGraph<P>
where
    P: ResolutionPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for DependencyGraph<P>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("vertices", &self.vertices)
            .field("edges", &self.edges)
            .field("pending", &self.pending)
            .finish()
    }
}

/// `Display` adapter returned by [`DependencyGraph::describe`].
///
/// Renders as `Vertex{id=3, dependencies=on ->1, 2}`.
pub struct VertexDisplay<'a, P> {
    graph: &'a DependencyGraph<P>,
    vertex: &'a Vertex<P>,
}

impl<P> fmt::Display for VertexDisplay<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vertex{{id={}, dependencies=on ->", self.vertex.id())?;
        let sources = self
            .vertex
            .outdegrees()
            .iter()
            .filter_map(|edge_id| self.graph.edges.get(edge_id).map(Edge::source));
        for (i, source) in sources.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{source}")?;
        }
        f.write_str("}")
    }
}

/// Handle for mutating one vertex with chained calls.
///
/// The vertex stays in the graph for as long as the handle lives. Calls that
/// run edge actions, which may remove vertices, consume the handle.
///
/// ```rust
/// use trellis_core::dependency::{DependencyGraph, VertexId};
/// use trellis_core::GraphError;
///
/// fn noop(_: &mut DependencyGraph<()>, _: VertexId, _: VertexId) -> Result<(), GraphError> {
///     Ok(())
/// }
///
/// let mut graph: DependencyGraph<()> = DependencyGraph::new();
/// let a = graph.add_vertex(());
/// let b = graph.add_vertex(());
/// let c = graph.add_vertex(());
///
/// graph
///     .vertex_mut(c)
///     .unwrap()
///     .depends_on(a, noop)?
///     .depends_on(b, noop)?;
///
/// assert_eq!(graph.dependency_set(c)?, vec![a, b]);
/// # Ok::<(), GraphError>(())
/// ```
pub struct VertexMut<'a, P> {
    graph: &'a mut DependencyGraph<P>,
    id: VertexId,
}

impl<P> VertexMut<'_, P>
where
    P: ResolutionPolicy,
{
    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn policy(&self) -> &P {
        &self.graph.vertices[&self.id].policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.graph.vertices[&self.id].policy
    }

    /// Depend on `source`; see [`DependencyGraph::depends_on`].
    pub fn depends_on<F>(&mut self, source: VertexId, action: F) -> Result<&mut Self, GraphError>
    where
        F: FnOnce(&mut DependencyGraph<P>, VertexId, VertexId) -> Result<(), GraphError> + 'static,
    {
        self.graph.depends_on(self.id, source, action)?;
        Ok(self)
    }

    /// Stop depending on `source`; see [`DependencyGraph::undepends_on`].
    pub fn undepends_on(&mut self, source: VertexId) -> Result<&mut Self, GraphError> {
        self.graph.undepends_on(self.id, source)?;
        Ok(self)
    }

    /// Detach from the graph; see [`DependencyGraph::disconnect`].
    pub fn disconnect(&mut self) -> Result<&mut Self, GraphError> {
        self.graph.disconnect(self.id)?;
        Ok(self)
    }

    pub fn adjacency_set(&self) -> Result<Vec<VertexId>, GraphError> {
        self.graph.adjacency_set(self.id)
    }

    pub fn dependency_set(&self) -> Result<Vec<VertexId>, GraphError> {
        self.graph.dependency_set(self.id)
    }

    /// Fire this vertex's dependents; see [`DependencyGraph::fire_resolved`].
    pub fn fire_resolved(self) -> Result<usize, GraphError> {
        self.graph.fire_resolved(self.id)
    }

    pub fn can_resolve(&self) -> Result<bool, GraphError> {
        self.graph.can_resolve(self.id)
    }

    pub fn resolve(self, result: P::Output) -> Result<(), GraphError> {
        self.graph.resolve(self.id, result)
    }
}
