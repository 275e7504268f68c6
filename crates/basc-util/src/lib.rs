//! basc-util - Foundation types for the basc compiler.
//!
//! This crate holds the infrastructure every pipeline stage leans on:
//!
//! - [`Symbol`]: interned strings for identifiers, block labels, and
//!   built-in names, with O(1) comparison.
//! - [`IndexVec`] and the [`define_idx!`] macro: typed arena indices so a
//!   scope handle can never be confused with a type handle.
//! - [`Span`]: line/column source locations carried on every AST node and
//!   diagnostic.
//! - [`NodeId`]: stable AST-node identity used to key the analyzer's side
//!   tables.
//! - [`diagnostic`]: the accumulating error/warning handler shared by the
//!   analyzer and the driver.

pub mod diagnostic;
pub mod error;
pub mod index_vec;
pub mod node_id;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Handler, Level};
pub use index_vec::{Idx, IndexVec};
pub use node_id::{NodeId, NodeIdGenerator};
pub use span::Span;
pub use symbol::Symbol;

// Re-export commonly used hash collections
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
