//! Select Case patterns.

use crate::{BinOp, Expr, TypeRef};
use basc_util::{NodeId, Span, Symbol};

/// A pattern in a Case arm, with an optional When guard.
#[derive(Debug, Clone)]
pub struct CasePattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: CasePatternKind,
    pub guard: Option<Expr>,
}

/// Case pattern kinds.
#[derive(Debug, Clone)]
pub enum CasePatternKind {
    /// Type test, optionally binding the matched value in the case body.
    Type {
        ty: TypeRef,
        binding: Option<Symbol>,
    },

    /// Match against a constant expression.
    Constant(Expr),

    /// Inclusive range `lo To hi`.
    Range { lo: Expr, hi: Expr },

    /// Relational test `Is op value`.
    Comparison { op: BinOp, rhs: Expr },
}
