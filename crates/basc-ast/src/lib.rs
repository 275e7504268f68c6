//! basc-ast - AST contract consumed from the parser.
//!
//! The lexer and parser are external collaborators; this crate is the sole
//! interface between them and the compilation core. It defines the node
//! categories the semantic analyzer and IR builder consume: declarations,
//! statements, expressions, type references, and Select Case patterns.
//!
//! Every node carries a [`basc_util::NodeId`] (the key for the analyzer's
//! side tables) and a [`basc_util::Span`] (line/column for diagnostics). The
//! crate holds no behavior beyond the [`AstFactory`] used by embedders and
//! tests to mint well-formed nodes.

mod expr;
mod factory;
mod items;
mod pattern;
mod stmt;
mod types;

pub use expr::*;
pub use factory::AstFactory;
pub use items::*;
pub use pattern::*;
pub use stmt::*;
pub use types::*;

/// AST root - an ordered list of top-level declarations.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
}

impl Program {
    pub fn new(decls: Vec<Decl>) -> Self {
        Self { decls }
    }
}
