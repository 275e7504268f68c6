//! Expression nodes.

use crate::{Block, Parameter, TypeRef};
use basc_util::{NodeId, Span, Symbol};

/// An expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

/// Expression kinds.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Binary operation, including comparisons and `&` concatenation.
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Unary operation; `postfix` distinguishes `i++` from `++i`.
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        postfix: bool,
    },

    /// Literal value with its token-kind tag.
    Literal(Literal),

    /// Interpolated string: ordered text and expression parts.
    InterpolatedString(Vec<InterpPart>),

    /// Plain identifier.
    Identifier(Symbol),

    /// Member access `object.member`.
    MemberAccess { object: Box<Expr>, member: Symbol },

    /// Call with callee expression, arguments, and generic arguments.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        generic_args: Vec<TypeRef>,
    },

    /// Array element access; one index per dimension.
    ArrayAccess { base: Box<Expr>, indices: Vec<Expr> },

    /// Object or array construction.
    New { ty: TypeRef, args: Vec<Expr> },

    /// Explicit cast.
    Cast { ty: TypeRef, expr: Box<Expr> },

    /// `MyBase` reference inside a derived class.
    MyBase,

    /// The subject of the enclosing With statement (leading-dot access).
    WithSubject,

    /// Lambda expression.
    Lambda(LambdaExpr),

    /// `Await expr`.
    Await(Box<Expr>),

    /// Collection initializer `{a, b, c}`.
    CollectionInit { elements: Vec<Expr> },

    /// Tuple literal with optionally named elements.
    TupleLiteral {
        elements: Vec<(Option<Symbol>, Expr)>,
    },
}

/// Binary operators as they appear in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    IntDiv,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// True for the six comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitwiseNot,
    Inc,
    Dec,
}

/// Literal values, tagged with the token kind that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Null,
}

/// One part of an interpolated string.
#[derive(Debug, Clone)]
pub enum InterpPart {
    /// Literal text between holes.
    Text(String),
    /// An interpolation hole.
    Expr(Expr),
}

/// A lambda expression; `is_sub` lambdas produce no value.
#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<Parameter>,
    pub body: LambdaBody,
    pub is_sub: bool,
}

/// Lambda body: single expression or statement block.
#[derive(Debug, Clone)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}
