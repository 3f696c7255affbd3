//! Traversal Contexts
//!
//! This module provides the state that accompanies a depth-first walk over an
//! arbitrary tree or graph. The walk itself (visitor dispatch, enter/leave
//! callbacks, the order children are visited in) belongs to the caller; the
//! types here only remember what the walk needs to remember.
//!
//! # Overview
//!
//! - A [`Traversal`] is one run. It owns the visited set, the initial data and
//!   an arena holding one frame per visited node occurrence.
//! - A context is addressed by [`ContextId`] and links to its parent by id.
//! - [`Context`] reads a context; [`ContextMut`] writes to it.
//!
//! # Design Decisions
//!
//! 1. Contexts live in an arena instead of holding parent references. Parent
//!    links are plain ids, so there are no reference cycles and no shared
//!    ownership.
//!
//! 2. The visited set belongs to the session. Every context borrows the same
//!    set, which keeps "one set per run" true without global state.
//!
//! 3. Variables are keyed by type. A driver defines a small newtype per
//!    variable (say `struct ListIndex(usize)`) and gets typed lookups back.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::traversal::Traversal;
//!
//! #[derive(Debug, PartialEq)]
//! struct Indent(usize);
//!
//! let mut traversal: Traversal<&str, usize> = Traversal::new(());
//! let root = traversal.push_root("root");
//! let leaf = traversal.push_child(root, "leaf").unwrap();
//!
//! traversal.context_mut(root).unwrap().set_var(Indent(2));
//! traversal.context_mut(leaf).unwrap().set_result(1);
//!
//! let leaf = traversal.context(leaf).unwrap();
//! assert_eq!(leaf.get_var::<Indent>(), Some(&Indent(2)));
//! assert_eq!(leaf.path(), vec![&"root", &"leaf"]);
//! ```

mod context;
mod vars;

pub use context::{Ancestors, Context, ContextId, ContextMut, Traversal};
