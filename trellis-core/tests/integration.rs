//! Integration Tests
//!
//! These tests drive the traversal contexts and the dependency graph the way
//! a caller would: with a small depth-first walker and a resolution pass.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use trellis_core::dependency::{resolve_when_ready, Countdown, DependencyGraph, VertexId};
use trellis_core::traversal::{ContextId, Traversal};
use trellis_core::GraphError;

/// Adjacency list keyed by node name.
type Adjacency = HashMap<&'static str, Vec<&'static str>>;

fn adjacency(edges: &[(&'static str, &'static str)]) -> Adjacency {
    let mut map = Adjacency::new();
    for &(from, to) in edges {
        map.entry(from).or_default().push(to);
        map.entry(to).or_default();
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Depth(usize);

/// Depth-first walk that sums subtree sizes bottom-up and skips nodes it
/// has already seen, so shared children and cycles are only counted once.
fn subtree_size(traversal: &mut Traversal<&'static str, usize, Adjacency>, id: ContextId) -> usize {
    let children = {
        let mut ctx = traversal.context_mut(id).unwrap();
        if ctx.is_visited() {
            ctx.set_result(0);
            return 0;
        }
        ctx.mark_visited();
        let depth = ctx.parent_context().and_then(|p| p.get_var::<Depth>().copied());
        ctx.set_var(Depth(depth.map_or(0, |d| d.0 + 1)));
        let children = ctx.initial_data().get(ctx.this_node()).cloned();
        children.unwrap_or_default()
    };

    let mut total = 1;
    for child in children {
        let child_id = traversal.push_child(id, child).unwrap();
        total += subtree_size(traversal, child_id);
    }

    traversal
        .context_mut(id)
        .unwrap()
        .compute_result_if_absent(|_| total)
        .copied()
        .unwrap()
}

/// A walker over a DAG with a shared child counts the child once.
#[test]
fn walker_uses_visited_set_for_shared_nodes() {
    let graph = adjacency(&[("root", "a"), ("root", "b"), ("a", "shared"), ("b", "shared")]);
    let mut traversal = Traversal::new(graph);
    let root = traversal.push_root("root");

    assert_eq!(subtree_size(&mut traversal, root), 4);
    assert_eq!(traversal.visited_nodes().len(), 4);
    assert_eq!(
        traversal.visited_nodes().iter().copied().collect::<Vec<_>>(),
        vec!["root", "a", "shared", "b"]
    );
}

/// A cycle does not send the walker into infinite recursion.
#[test]
fn walker_terminates_on_cycles() {
    let graph = adjacency(&[("x", "y"), ("y", "z"), ("z", "x")]);
    let mut traversal = Traversal::new(graph);
    let root = traversal.push_root("x");

    assert_eq!(subtree_size(&mut traversal, root), 3);

    // The revisit of "x" got its own context, marked as already visited.
    let ctx = traversal
        .contexts()
        .find(|ctx| *ctx.this_node() == "x" && !ctx.is_root())
        .unwrap();
    assert!(ctx.is_visited());
    assert_eq!(ctx.result(), Some(&0));
    assert_eq!(ctx.path(), vec![&"x", &"y", &"z", &"x"]);
    assert_eq!(ctx.parent_context().unwrap().get_var::<Depth>(), Some(&Depth(2)));
}

/// Variables set by an ancestor are visible below it; children shadow them
/// without changing what the ancestor or siblings see.
#[test]
fn scoped_variables_across_siblings() {
    let mut traversal: Traversal<&str> = Traversal::new(());
    let root = traversal.push_root("root");
    let left = traversal.push_child(root, "left").unwrap();
    let right = traversal.push_child(root, "right").unwrap();
    let left_leaf = traversal.push_child(left, "left-leaf").unwrap();

    traversal.context_mut(root).unwrap().set_var(Depth(0));
    traversal.context_mut(left).unwrap().set_var(Depth(10));

    assert_eq!(traversal.context(left_leaf).unwrap().get_var::<Depth>(), Some(&Depth(10)));
    assert_eq!(traversal.context(right).unwrap().get_var::<Depth>(), Some(&Depth(0)));
    assert_eq!(traversal.context(root).unwrap().get_var::<Depth>(), Some(&Depth(0)));
}

/// Bottom-up reduction reads the parent's result from a child.
#[test]
fn child_reads_parent_result() {
    let mut traversal: Traversal<u32, String> = Traversal::new(());
    let root = traversal.push_root(1);
    let child = traversal.push_child(root, 2).unwrap();

    assert!(traversal.context(child).unwrap().parent_result().is_none());

    traversal
        .context_mut(root)
        .unwrap()
        .compute_result_if_absent(|ctx| format!("node-{}", ctx.this_node()));

    assert_eq!(
        traversal.context(child).unwrap().parent_result().map(String::as_str),
        Some("node-1")
    );
}

fn sum_of_dependencies(graph: &DependencyGraph<Countdown<u32>>, sink: VertexId) -> u32 {
    graph
        .dependency_set(sink)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|dep| graph.policy(dep).and_then(Countdown::value).copied())
        .sum()
}

/// D depends on B and C, which both depend on A. D resolves only after both
/// B and C have fired into it, and it resolves exactly once. A's edges all
/// fire before the edges of the vertices they resolve.
#[test]
fn diamond_resolves_once_after_both_paths() {
    let mut graph: DependencyGraph<Countdown<u32>> = DependencyGraph::new();
    let a = graph.add_vertex(Countdown::new());
    let b = graph.add_vertex(Countdown::new());
    let c = graph.add_vertex(Countdown::new());
    let d = graph.add_vertex(Countdown::new());
    let resolutions = Rc::new(RefCell::new(Vec::new()));

    for (sink, source) in [(b, a), (c, a), (d, b), (d, c)] {
        let log = Rc::clone(&resolutions);
        graph
            .depends_on(sink, source, move |graph, source, sink| {
                let ready = graph.can_resolve(sink)?;
                log.borrow_mut().push((source, sink, ready));
                if ready {
                    let value = sum_of_dependencies(graph, sink);
                    graph.resolve(sink, value)?;
                }
                Ok(())
            })
            .unwrap();
    }

    assert_eq!(graph.policy(d).unwrap().remaining(), 2);
    graph.resolve(a, 1).unwrap();

    let log = resolutions.borrow();
    assert_eq!(
        *log,
        vec![(a, b, true), (a, c, true), (b, d, false), (c, d, true)]
    );
    assert_eq!(graph.policy(b).unwrap().value(), Some(&1));
    assert_eq!(graph.policy(c).unwrap().value(), Some(&1));
    assert_eq!(graph.policy(d).unwrap().value(), Some(&2));
    assert!(!graph.can_resolve(d).unwrap());
}

/// Removing an unfired dependency lets the dependent resolve without it.
#[test]
fn undepending_releases_waiting_vertex() {
    let mut graph: DependencyGraph<Countdown<u32>> = DependencyGraph::new();
    let fast = graph.add_vertex(Countdown::new());
    let slow = graph.add_vertex(Countdown::new());
    let sink = graph.add_vertex(Countdown::new());

    graph
        .depends_on(sink, fast, resolve_when_ready(sum_of_dependencies))
        .unwrap();
    graph
        .depends_on(sink, slow, resolve_when_ready(sum_of_dependencies))
        .unwrap();

    graph.resolve(fast, 5).unwrap();
    assert!(!graph.policy(sink).unwrap().is_resolved());

    graph.undepends_on(sink, slow).unwrap();
    assert!(graph.can_resolve(sink).unwrap());

    let value = sum_of_dependencies(&graph, sink);
    graph.resolve(sink, value).unwrap();
    assert_eq!(graph.policy(sink).unwrap().value(), Some(&5));
}

/// A vertex disconnected mid-resolution no longer receives fire signals.
#[test]
fn disconnect_during_resolution() {
    let mut graph: DependencyGraph<Countdown<u32>> = DependencyGraph::new();
    let root = graph.add_vertex(Countdown::new());
    let first = graph.add_vertex(Countdown::new());
    let second = graph.add_vertex(Countdown::new());

    graph
        .depends_on(first, root, move |graph, _, sink| {
            graph.disconnect(second)?;
            graph.resolve(sink, 1)
        })
        .unwrap();
    graph
        .depends_on(second, root, resolve_when_ready(|_: &DependencyGraph<Countdown<u32>>, _| 2))
        .unwrap();

    assert_eq!(graph.fire_resolved(root).unwrap(), 1);
    assert_eq!(graph.policy(first).unwrap().value(), Some(&1));
    assert!(!graph.policy(second).unwrap().is_resolved());
    assert!(graph.vertex(second).unwrap().is_isolated());
    assert_eq!(graph.adjacency_set(root).unwrap(), vec![first]);
}

/// After `disconnect`, no vertex refers to the disconnected one.
#[test]
fn disconnect_isolates_vertex() {
    let mut graph: DependencyGraph<()> = DependencyGraph::new();
    let ids: Vec<VertexId> = (0..4).map(|_| graph.add_vertex(())).collect();
    let hub = ids[0];

    for &other in &ids[1..] {
        graph.depends_on(other, hub, |_, _, _| Ok(())).unwrap();
        graph.depends_on(hub, other, |_, _, _| Ok(())).unwrap();
    }

    graph.vertex_mut(hub).unwrap().disconnect().unwrap();

    assert!(graph.adjacency_set(hub).unwrap().is_empty());
    assert!(graph.dependency_set(hub).unwrap().is_empty());
    for &other in &ids[1..] {
        assert!(!graph.adjacency_set(other).unwrap().contains(&hub));
        assert!(!graph.dependency_set(other).unwrap().contains(&hub));
    }
    assert_eq!(graph.edge_count(), 0);
}

/// Operations on a vertex that was never added fail without side effects.
#[test]
fn unknown_vertex_errors() {
    let mut graph: DependencyGraph<()> = DependencyGraph::new();
    let a = graph.add_vertex(());
    let mut other: DependencyGraph<()> = DependencyGraph::new();
    let foreign = other.add_vertex(());

    assert_eq!(graph.fire_resolved(foreign), Err(GraphError::UnknownVertex(foreign)));
    assert_eq!(graph.undepends_on(a, foreign), Err(GraphError::UnknownVertex(foreign)));
    assert_eq!(graph.disconnect(foreign), Err(GraphError::UnknownVertex(foreign)));
    assert!(graph.vertex_mut(foreign).is_none());
    assert_eq!(
        GraphError::UnknownVertex(foreign).to_string(),
        format!("unknown vertex: {foreign}")
    );
}

/// A traversal can walk the vertices of a dependency graph.
#[test]
fn traversal_over_dependency_graph() {
    let mut graph: DependencyGraph<()> = DependencyGraph::new();
    let a = graph.add_vertex(());
    let b = graph.add_vertex(());
    let c = graph.add_vertex(());
    graph.depends_on(b, a, |_, _, _| Ok(())).unwrap();
    graph.depends_on(c, b, |_, _, _| Ok(())).unwrap();

    let mut traversal: Traversal<VertexId> = Traversal::new(());
    let mut stack = vec![traversal.push_root(a)];
    let mut order = Vec::new();

    while let Some(id) = stack.pop() {
        let mut ctx = traversal.context_mut(id).unwrap();
        if !ctx.mark_visited() {
            continue;
        }
        let vertex = *ctx.this_node();
        order.push(vertex);
        for dependent in graph.adjacency_set(vertex).unwrap() {
            stack.push(traversal.push_child(id, dependent).unwrap());
        }
    }

    assert_eq!(order, vec![a, b, c]);
}

#[cfg(feature = "serde")]
#[test]
fn ids_serialize() {
    let mut graph: DependencyGraph<()> = DependencyGraph::new();
    let a = graph.add_vertex(());

    let json = serde_json::to_string(&a).unwrap();
    let back: VertexId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, a);
}
