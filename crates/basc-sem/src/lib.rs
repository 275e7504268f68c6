//! basc-sem - Semantic analysis for the basc compiler.
//!
//! Consumes the AST contract from `basc-ast` and produces an [`Analysis`]:
//! a populated scope tree, a symbol arena, an interned type table, and side
//! tables mapping every expression node to its resolved type and every
//! identifier node to its resolved symbol. Errors and warnings accumulate in
//! the shared [`basc_util::Handler`] so one run surfaces as many problems as
//! possible; the driver skips emission when any error was reported.
//!
//! The standard-library table lives here too and is shared with the emitter:
//! the analyzer reads its signatures, the emitter its target templates.

pub mod analysis;
#[cfg(test)]
mod edge_cases;
pub mod infer;
pub mod scope;
pub mod stdlib;
pub mod symbols;
pub mod types;

pub use analysis::{Analysis, AnalysisFailed, Analyzer};
pub use scope::{Scope, ScopeId, ScopeKind, ScopeTree};
pub use stdlib::{BuiltinDef, StdLib};
pub use symbols::{ParamInfo, SymbolArena, SymbolFlags, SymbolId, SymbolInfo, SymbolKind};
pub use types::{CastKind, ConstValue, NumericKind, TupleElem, TypeId, TypeInfo, TypeKind, TypeTable};
