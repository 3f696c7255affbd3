//! Trellis Core
//!
//! This crate provides two generic building blocks for walking and resolving
//! ordered structures:
//!
//! - Traversal contexts: the per-node state of a depth-first walk, with
//!   parent links, a shared visited set, scoped variables and memoized
//!   results
//! - A dependency graph whose vertices resolve once all of their
//!   dependencies have, signalling their dependents as they go
//!
//! Neither half drives anything by itself. A caller owns the walk (or the
//! resolution pass) and uses these types to keep its state.
//!
//! # Architecture
//!
//! - `traversal`: the [`Traversal`](traversal::Traversal) session and its
//!   context handles
//! - `dependency`: [`DependencyGraph`](dependency::DependencyGraph), its
//!   vertices, edges and resolution policies
//! - `error`: error types shared by both
//!
//! The two modules do not depend on each other.
//!
//! # Threading
//!
//! Everything here is single-threaded and synchronous. State is mutated
//! through `&mut`, and nothing is locked internally; wrap a session or graph
//! yourself if it has to cross threads.

pub mod dependency;
pub mod error;
pub mod traversal;

pub use error::{GraphError, TraversalError};
