//! Traversal Contexts
//!
//! A [`Traversal`] is the session object for one walk. It owns everything the
//! contexts of that walk share (the visited set and the initial data) and an
//! arena of per-node frames. Contexts are addressed by [`ContextId`] and link
//! to their parent by id, so the ancestor chain never forms a reference cycle.
//!
//! Access goes through two short-lived handles:
//!
//! - [`Context`] is a shared view, freely copyable, used for reads and handed
//!   to providers.
//! - [`ContextMut`] is the write handle a driver uses to bind variables and
//!   memoize results.
//!
//! # Scoping
//!
//! Variable lookups walk from a context up through its ancestors and return the
//! nearest binding. Writes always land in the context doing the write, so a
//! child can shadow an ancestor binding without its siblings or the ancestor
//! ever seeing the change.

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use tracing::trace;

use super::vars::Vars;
use crate::error::TraversalError;

/// Identifier of a context within one [`Traversal`].
///
/// Every id carries the tag of the session that issued it. Another
/// traversal, or the same one after [`Traversal::reset`], reports it as
/// unknown instead of resolving it to one of its own contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextId {
    session: u64,
    index: usize,
}

impl ContextId {
    /// Get the raw arena index.
    pub fn raw(&self) -> usize {
        self.index
    }
}

/// Allocate a tag for a fresh traversal session.
fn next_session() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Memoized result of a context.
#[derive(Debug)]
enum ResultMemo<R> {
    /// Nothing computed yet.
    Pending,

    /// Computed once; `None` means the result settled as absent.
    Settled(Option<R>),
}

impl<R> ResultMemo<R> {
    fn is_pending(&self) -> bool {
        matches!(self, ResultMemo::Pending)
    }

    fn value(&self) -> Option<&R> {
        match self {
            ResultMemo::Settled(value) => value.as_ref(),
            ResultMemo::Pending => None,
        }
    }
}

/// Per-node state stored in the traversal arena.
#[derive(Debug)]
struct Frame<T, R> {
    node: T,
    parent: Option<ContextId>,
    vars: Vars,
    result: ResultMemo<R>,
}

/// One traversal run.
///
/// # Type Parameters
///
/// - `T`: the node type. Opaque to the traversal apart from `Hash + Eq`,
///   which the shared visited set needs.
/// - `R`: the per-context result type.
/// - `D`: the initial data shared by every context of the run.
pub struct Traversal<T, R = (), D = ()> {
    session: u64,
    frames: Vec<Frame<T, R>>,
    visited: IndexSet<T>,
    initial_data: D,
}

impl<T, R, D> Traversal<T, R, D>
where
    T: Hash + Eq,
{
    /// Create an empty traversal seeded with `initial_data`.
    pub fn new(initial_data: D) -> Self {
        Self {
            session: next_session(),
            frames: Vec::new(),
            visited: IndexSet::new(),
            initial_data,
        }
    }

    /// Push a context that has no parent.
    ///
    /// A traversal may hold several roots when walking a forest.
    pub fn push_root(&mut self, node: T) -> ContextId {
        self.push(node, None)
    }

    /// Push a context for `node` below `parent`.
    pub fn push_child(&mut self, parent: ContextId, node: T) -> Result<ContextId, TraversalError> {
        if !self.owns(parent) {
            return Err(TraversalError::UnknownContext(parent));
        }
        Ok(self.push(node, Some(parent)))
    }

    fn push(&mut self, node: T, parent: Option<ContextId>) -> ContextId {
        let id = self.id_at(self.frames.len());
        self.frames.push(Frame {
            node,
            parent,
            vars: Vars::new(),
            result: ResultMemo::Pending,
        });
        trace!(context = id.raw(), parent = ?parent.map(|p| p.raw()), "pushed traversal context");
        id
    }

    /// Whether `id` was issued by this session and is still live.
    pub fn owns(&self, id: ContextId) -> bool {
        id.session == self.session && id.index < self.frames.len()
    }

    fn id_at(&self, index: usize) -> ContextId {
        ContextId {
            session: self.session,
            index,
        }
    }

    /// Get a read view of a context.
    pub fn context(&self, id: ContextId) -> Option<Context<'_, T, R, D>> {
        if !self.owns(id) {
            return None;
        }
        Some(Context {
            traversal: self,
            id,
        })
    }

    /// Get a write handle to a context.
    pub fn context_mut(&mut self, id: ContextId) -> Option<ContextMut<'_, T, R, D>> {
        if !self.owns(id) {
            return None;
        }
        Some(ContextMut {
            traversal: self,
            id,
        })
    }

    /// Iterate over every context in the order they were pushed.
    pub fn contexts(&self) -> impl Iterator<Item = Context<'_, T, R, D>> + '_ {
        (0..self.frames.len()).map(move |index| Context {
            traversal: self,
            id: self.id_at(index),
        })
    }

    /// Every node recorded as visited so far, in recording order.
    pub fn visited_nodes(&self) -> &IndexSet<T> {
        &self.visited
    }

    /// Mutable access to the shared visited set.
    pub fn visited_nodes_mut(&mut self) -> &mut IndexSet<T> {
        &mut self.visited
    }

    /// Record `node` as visited. Returns `false` if it already was.
    pub fn mark_visited(&mut self, node: T) -> bool {
        self.visited.insert(node)
    }

    /// The data every context of this run shares.
    pub fn initial_data(&self) -> &D {
        &self.initial_data
    }

    /// Number of contexts pushed so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every context and forget every visited node.
    ///
    /// The initial data is kept so the session can be reused for another
    /// run over the same input. Ids issued before the reset stay unknown.
    pub fn reset(&mut self) {
        self.session = next_session();
        self.frames.clear();
        self.visited.clear();
    }

    fn frame(&self, id: ContextId) -> &Frame<T, R> {
        &self.frames[id.index]
    }

    fn frame_mut(&mut self, id: ContextId) -> &mut Frame<T, R> {
        &mut self.frames[id.index]
    }

    /// Find the nearest context, starting at `from`, that binds `S`.
    fn var_owner<S: Any>(&self, from: ContextId) -> Option<ContextId> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let frame = self.frame(id);
            if frame.vars.contains::<S>() {
                return Some(id);
            }
            cursor = frame.parent;
        }
        None
    }
}

impl<T, R, D> Default for Traversal<T, R, D>
where
    T: Hash + Eq,
    D: Default,
{
    fn default() -> Self {
        Self::new(D::default())
    }
}

impl<T, R, D> fmt::Debug for Traversal<T, R, D>
where
    T: fmt::Debug,
    D: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("contexts", &self.frames.len())
            .field("visited", &self.visited)
            .field("initial_data", &self.initial_data)
            .finish()
    }
}

/// Read view of one context.
pub struct Context<'a, T, R = (), D = ()> {
    traversal: &'a Traversal<T, R, D>,
    id: ContextId,
}

impl<T, R, D> Clone for Context<'_, T, R, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, R, D> Copy for Context<'_, T, R, D> {}

impl<'a, T, R, D> Context<'a, T, R, D>
where
    T: Hash + Eq,
{
    /// Get the id of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The node this context wraps.
    pub fn this_node(&self) -> &'a T {
        &self.traversal.frame(self.id).node
    }

    /// The immediate ancestor, or `None` for a root.
    pub fn parent_context(&self) -> Option<Context<'a, T, R, D>> {
        self.traversal
            .frame(self.id)
            .parent
            .map(|parent| Context {
                traversal: self.traversal,
                id: parent,
            })
    }

    /// The parent's memoized result.
    ///
    /// `None` when there is no parent, when the parent has not settled a
    /// result yet, or when it settled as absent. Never runs a provider.
    pub fn parent_result(&self) -> Option<&'a R> {
        self.parent_context().and_then(|parent| parent.result())
    }

    /// This context's memoized result without settling it.
    pub fn result(&self) -> Option<&'a R> {
        self.traversal.frame(self.id).result.value()
    }

    /// Check whether the result memo has been settled (possibly as absent).
    pub fn has_result(&self) -> bool {
        !self.traversal.frame(self.id).result.is_pending()
    }

    /// Check whether [`this_node`](Self::this_node) is in the visited set.
    pub fn is_visited(&self) -> bool {
        self.traversal.visited.contains(self.this_node())
    }

    /// The visited set shared by every context of the traversal.
    pub fn visited_nodes(&self) -> &'a IndexSet<T> {
        &self.traversal.visited
    }

    /// Nearest binding of `S`, walking up the ancestors.
    pub fn get_var<S: Any>(&self) -> Option<&'a S> {
        self.traversal
            .var_owner::<S>(self.id)
            .and_then(|owner| self.traversal.frame(owner).vars.get::<S>())
    }

    /// Check whether `S` is bound here or in an ancestor.
    pub fn has_var<S: Any>(&self) -> bool {
        self.traversal.var_owner::<S>(self.id).is_some()
    }

    /// The data shared by every context of the traversal.
    pub fn initial_data(&self) -> &'a D {
        &self.traversal.initial_data
    }

    /// Check whether this context has no parent.
    pub fn is_root(&self) -> bool {
        self.traversal.frame(self.id).parent.is_none()
    }

    /// Number of ancestors between this context and its root.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Iterate over the ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors<'a, T, R, D> {
        Ancestors {
            traversal: self.traversal,
            next: self.traversal.frame(self.id).parent,
        }
    }

    /// Nodes from the root down to this context, inclusive.
    pub fn path(&self) -> Vec<&'a T> {
        let mut path: Vec<&'a T> = self.ancestors().map(|ctx| ctx.this_node()).collect();
        path.reverse();
        path.push(self.this_node());
        path
    }
}

impl<T, R, D> fmt::Debug for Context<'_, T, R, D>
where
    T: Hash + Eq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("node", self.this_node())
            .field("parent", &self.traversal.frame(self.id).parent)
            .field("has_result", &self.has_result())
            .finish()
    }
}

/// Iterator over the ancestors of a context.
pub struct Ancestors<'a, T, R = (), D = ()> {
    traversal: &'a Traversal<T, R, D>,
    next: Option<ContextId>,
}

impl<'a, T, R, D> Iterator for Ancestors<'a, T, R, D>
where
    T: Hash + Eq,
{
    type Item = Context<'a, T, R, D>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.traversal.frame(id).parent;
        Some(Context {
            traversal: self.traversal,
            id,
        })
    }
}

/// Write handle to one context.
pub struct ContextMut<'a, T, R = (), D = ()> {
    traversal: &'a mut Traversal<T, R, D>,
    id: ContextId,
}

impl<T, R, D> ContextMut<'_, T, R, D>
where
    T: Hash + Eq,
{
    /// Borrow this handle as a read view.
    pub fn as_context(&self) -> Context<'_, T, R, D> {
        Context {
            traversal: &*self.traversal,
            id: self.id,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn this_node(&self) -> &T {
        &self.traversal.frame(self.id).node
    }

    pub fn parent_context(&self) -> Option<Context<'_, T, R, D>> {
        self.as_context().parent_context()
    }

    pub fn parent_result(&self) -> Option<&R> {
        self.as_context().parent_result()
    }

    pub fn is_visited(&self) -> bool {
        self.as_context().is_visited()
    }

    pub fn visited_nodes(&self) -> &IndexSet<T> {
        &self.traversal.visited
    }

    /// Mutable access to the shared visited set.
    ///
    /// Nothing in this crate adds to the set on its own; recording a node
    /// on its first visit is the driver's job.
    pub fn visited_nodes_mut(&mut self) -> &mut IndexSet<T> {
        &mut self.traversal.visited
    }

    /// Record this context's node as visited. Returns `false` if it already was.
    pub fn mark_visited(&mut self) -> bool
    where
        T: Clone,
    {
        let node = self.traversal.frame(self.id).node.clone();
        self.traversal.visited.insert(node)
    }

    pub fn get_var<S: Any>(&self) -> Option<&S> {
        self.as_context().get_var::<S>()
    }

    /// Get the nearest binding of `S`, or bind one computed by `provider`.
    ///
    /// A computed value is stored in this context, never in an ancestor.
    /// Once bound, later calls return the stored value and their providers
    /// are dropped without being called.
    pub fn compute_var_if_absent<S, F>(&mut self, provider: F) -> &S
    where
        S: Any,
        F: FnOnce(&Context<'_, T, R, D>) -> S,
    {
        let owner = match self.traversal.var_owner::<S>(self.id) {
            Some(owner) => owner,
            None => {
                let value = provider(&self.as_context());
                self.traversal.frame_mut(self.id).vars.insert(value);
                self.id
            }
        };
        self.traversal
            .frame(owner)
            .vars
            .get::<S>()
            .expect("owner context binds the variable")
    }

    /// Bind `S` in this context, shadowing any ancestor binding.
    pub fn set_var<S: Any>(&mut self, value: S) -> &mut Self {
        self.traversal.frame_mut(self.id).vars.insert(value);
        self
    }

    /// Overwrite the memoized result.
    pub fn set_result(&mut self, value: R) {
        self.traversal.frame_mut(self.id).result = ResultMemo::Settled(Some(value));
    }

    /// The memoized result, settling it as absent if nothing was computed.
    pub fn get_result(&mut self) -> Option<&R> {
        self.settle_result(|_| None)
    }

    /// The memoized result, computing it with `provider` on first use.
    pub fn compute_result_if_absent<F>(&mut self, provider: F) -> Option<&R>
    where
        F: FnOnce(&Context<'_, T, R, D>) -> R,
    {
        self.settle_result(|ctx| Some(provider(ctx)))
    }

    fn settle_result<F>(&mut self, provider: F) -> Option<&R>
    where
        F: FnOnce(&Context<'_, T, R, D>) -> Option<R>,
    {
        if self.traversal.frame(self.id).result.is_pending() {
            let value = provider(&self.as_context());
            self.traversal.frame_mut(self.id).result = ResultMemo::Settled(value);
        }
        self.traversal.frame(self.id).result.value()
    }

    pub fn initial_data(&self) -> &D {
        &self.traversal.initial_data
    }
}
