//! Graph Vertices
//!
//! This module defines the vertex type stored in a
//! [`DependencyGraph`](super::DependencyGraph) and the resolution policy a
//! vertex payload implements.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use super::edge::EdgeId;

/// Unique identifier for a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexId(u64);

impl VertexId {
    /// Generate a new unique vertex ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VertexId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decides when a vertex is ready and what resolving it means.
///
/// The graph calls the bookkeeping hooks as edges come and go, so a policy
/// can track its outstanding dependencies without looking at the graph.
/// Every method has a default: a payload that implements nothing is never
/// resolvable and ignores its result.
pub trait ResolutionPolicy {
    /// The value handed to [`resolve`](Self::resolve).
    type Output;

    /// Whether the vertex is ready to resolve.
    fn can_resolve(&self) -> bool {
        false
    }

    /// Record the resolved value. Firing dependents is done by the graph.
    fn resolve(&mut self, result: Self::Output) {
        let _ = result;
    }

    /// A dependency edge was added to this vertex.
    fn dependency_added(&mut self) {}

    /// One of this vertex's dependency edges fired.
    fn dependency_fired(&mut self) {}

    /// A dependency edge of this vertex was removed.
    fn dependency_removed(&mut self, fired: bool) {
        let _ = fired;
    }
}

impl ResolutionPolicy for () {
    type Output = ();
}

/// Policy that becomes ready once every dependency edge has fired.
///
/// The counter goes up for each dependency edge added and down when one
/// fires, or is removed before it fired. A vertex reached through several
/// paths (a diamond) therefore waits for all of them, and resolves once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown<V> {
    remaining: usize,
    resolved: bool,
    value: Option<V>,
}

impl<V> Countdown<V> {
    /// Create a countdown with no outstanding dependencies.
    pub fn new() -> Self {
        Self {
            remaining: 0,
            resolved: false,
            value: None,
        }
    }

    /// Number of dependencies that have not fired yet.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Check whether the vertex has resolved.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Consume the policy and return the resolved value.
    pub fn into_value(self) -> Option<V> {
        self.value
    }
}

impl<V> Default for Countdown<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResolutionPolicy for Countdown<V> {
    type Output = V;

    fn can_resolve(&self) -> bool {
        !self.resolved && self.remaining == 0
    }

    fn resolve(&mut self, result: V) {
        self.resolved = true;
        self.value = Some(result);
    }

    fn dependency_added(&mut self) {
        self.remaining = self.remaining.saturating_add(1);
    }

    fn dependency_fired(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn dependency_removed(&mut self, fired: bool) {
        if !fired {
            self.remaining = self.remaining.saturating_sub(1);
        }
    }
}

/// A vertex in the dependency graph.
#[derive(Debug)]
pub struct Vertex<P> {
    id: VertexId,

    /// Caller payload and resolution policy.
    pub(crate) policy: P,

    /// Edges to vertices that depend on this one. Fired on resolution.
    pub(crate) indegrees: IndexSet<EdgeId>,

    /// Edges to vertices this one depends on.
    pub(crate) outdegrees: IndexSet<EdgeId>,
}

impl<P> Vertex<P> {
    pub(crate) fn new(policy: P) -> Self {
        Self {
            id: VertexId::new(),
            policy,
            indegrees: IndexSet::new(),
            outdegrees: IndexSet::new(),
        }
    }

    /// Get the vertex's ID.
    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Edges whose source is this vertex, in insertion order.
    pub fn indegrees(&self) -> &IndexSet<EdgeId> {
        &self.indegrees
    }

    /// Edges whose sink is this vertex, in insertion order.
    pub fn outdegrees(&self) -> &IndexSet<EdgeId> {
        &self.outdegrees
    }

    /// Check whether no edge touches this vertex.
    pub fn is_isolated(&self) -> bool {
        self.indegrees.is_empty() && self.outdegrees.is_empty()
    }

    pub(crate) fn into_policy(self) -> P {
        self.policy
    }
}
