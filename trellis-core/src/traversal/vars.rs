//! Context Variables
//!
//! Each context carries a small map of variables keyed by the *type* of the
//! value. A context only ever writes its own map; inheritance is implemented
//! by the traversal walking the parent chain on lookup.

use std::any::{Any, TypeId};
use std::fmt;

use indexmap::IndexMap;

/// Type-keyed variable bindings local to one context.
#[derive(Default)]
pub(crate) struct Vars {
    bindings: IndexMap<TypeId, Box<dyn Any>>,
}

impl Vars {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Check whether this map binds `S`.
    pub(crate) fn contains<S: Any>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<S>())
    }

    /// Get the local binding for `S`, if any.
    pub(crate) fn get<S: Any>(&self) -> Option<&S> {
        self.bindings
            .get(&TypeId::of::<S>())
            .and_then(|value| value.downcast_ref::<S>())
    }

    /// Bind `S`, replacing a previous local binding.
    pub(crate) fn insert<S: Any>(&mut self, value: S) {
        self.bindings.insert(TypeId::of::<S>(), Box::new(value));
    }

    /// Number of local bindings.
    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}

impl fmt::Debug for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vars")
            .field("bindings", &self.len())
            .finish()
    }
}
