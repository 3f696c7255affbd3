//! Dependency Graph
//!
//! This module implements a graph of vertices connected by directed
//! "depends on" edges, with incremental fire-on-ready resolution.
//!
//! # Overview
//!
//! - `sink.depends_on(source, action)` creates an edge `source -> sink`.
//! - When `source` resolves, each of its incoming edges *fires*: the edge's
//!   action runs once with the source and the sink.
//! - A typical action asks the sink whether it can now resolve and, if so,
//!   resolves it, which fires the sink's own edges. Resolution spreads through
//!   the graph in dependency order without a global sort.
//!
//! The graph does not decide when a vertex is ready. That is the job of the
//! vertex payload, through the [`ResolutionPolicy`] trait. [`Countdown`] is
//! the usual choice: it waits until every dependency edge has fired, so a
//! vertex reached through several paths resolves exactly once.
//!
//! # Design Decisions
//!
//! 1. Edges live in one table on the graph and vertices keep edge ids. Adding
//!    or removing an edge updates both endpoints in the same call.
//!
//! 2. Edge and vertex sets are insertion ordered (`indexmap`), so firing and
//!    the adjacency views are deterministic.
//!
//! 3. An edge fires at most once. Its action is an `FnOnce` taken out of the
//!    edge when it fires; calling `fire_resolved` again only fires edges that
//!    were added since.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::dependency::{resolve_when_ready, Countdown, DependencyGraph, VertexId};
//!
//! let mut graph: DependencyGraph<Countdown<u32>> = DependencyGraph::new();
//! let base = graph.add_vertex(Countdown::new());
//! let doubled = graph.add_vertex(Countdown::new());
//!
//! let double = move |graph: &DependencyGraph<Countdown<u32>>, _: VertexId| {
//!     graph.policy(base).and_then(Countdown::value).map_or(0, |v| v * 2)
//! };
//! graph.depends_on(doubled, base, resolve_when_ready(double)).unwrap();
//!
//! graph.resolve(base, 21).unwrap();
//! assert_eq!(graph.policy(doubled).and_then(Countdown::value), Some(&42));
//! ```

mod edge;
mod graph;
mod vertex;

pub use edge::{resolve_when_ready, Edge, EdgeAction, EdgeId};
pub use graph::{DependencyGraph, VertexDisplay, VertexMut};
pub use vertex::{Countdown, ResolutionPolicy, Vertex, VertexId};
