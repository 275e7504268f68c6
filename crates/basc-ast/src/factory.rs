//! Node factory for embedders and tests.
//!
//! The parser mints node ids as it builds the tree; everything else that
//! needs to construct AST fragments (tests, the driver's synthesized `Main`)
//! goes through an `AstFactory` so ids stay unique within a program.

use crate::*;
use basc_util::{NodeIdGenerator, Span, Symbol};

/// Factory wrapping a [`NodeIdGenerator`].
#[derive(Default)]
pub struct AstFactory {
    ids: NodeIdGenerator,
}

impl AstFactory {
    pub fn new() -> Self {
        Self {
            ids: NodeIdGenerator::new(),
        }
    }

    /// Wrap an expression kind into a node with a fresh id.
    pub fn expr(&self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.ids.next(),
            span,
            kind,
        }
    }

    /// Wrap a statement kind into a node with a fresh id.
    pub fn stmt(&self, kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            id: self.ids.next(),
            span,
            kind,
        }
    }

    /// Wrap a declaration kind into a node with a fresh id.
    pub fn decl(&self, kind: DeclKind, span: Span) -> Decl {
        Decl {
            id: self.ids.next(),
            span,
            kind,
        }
    }

    /// Wrap a case-pattern kind into a node with a fresh id.
    pub fn pattern(&self, kind: CasePatternKind, guard: Option<Expr>, span: Span) -> CasePattern {
        CasePattern {
            id: self.ids.next(),
            span,
            kind,
            guard,
        }
    }

    // ------------------------------------------------------------------
    // Expression shorthands
    // ------------------------------------------------------------------

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Identifier(Symbol::intern(name)), Span::DUMMY)
    }

    pub fn int(&self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Integer(value)), Span::DUMMY)
    }

    pub fn float(&self, value: f64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Float(value)), Span::DUMMY)
    }

    pub fn string(&self, value: &str) -> Expr {
        self.expr(
            ExprKind::Literal(Literal::Str(value.to_string())),
            Span::DUMMY,
        )
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)), Span::DUMMY)
    }

    pub fn binary(&self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Span::DUMMY,
        )
    }

    pub fn unary(&self, op: UnOp, operand: Expr) -> Expr {
        self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
                postfix: false,
            },
            Span::DUMMY,
        )
    }

    pub fn call(&self, callee: &str, args: Vec<Expr>) -> Expr {
        let callee = self.ident(callee);
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                generic_args: Vec::new(),
            },
            Span::DUMMY,
        )
    }

    pub fn method_call(&self, object: Expr, method: &str, args: Vec<Expr>) -> Expr {
        let callee = self.expr(
            ExprKind::MemberAccess {
                object: Box::new(object),
                member: Symbol::intern(method),
            },
            Span::DUMMY,
        );
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                generic_args: Vec::new(),
            },
            Span::DUMMY,
        )
    }

    pub fn array_access(&self, base: Expr, indices: Vec<Expr>) -> Expr {
        self.expr(
            ExprKind::ArrayAccess {
                base: Box::new(base),
                indices,
            },
            Span::DUMMY,
        )
    }

    // ------------------------------------------------------------------
    // Statement shorthands
    // ------------------------------------------------------------------

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expression(expr), Span::DUMMY)
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value), Span::DUMMY)
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Stmt {
        self.stmt(
            StmtKind::Assignment(AssignStmt {
                target,
                op: AssignOp::Assign,
                value,
            }),
            Span::DUMMY,
        )
    }

    pub fn local(&self, name: &str, ty: Option<TypeRef>, init: Option<Expr>) -> Stmt {
        let is_auto = ty.is_none();
        self.stmt(
            StmtKind::Local(VariableDecl {
                name: Symbol::intern(name),
                ty,
                init,
                is_auto,
                is_static: false,
                access: AccessLevel::Private,
            }),
            Span::DUMMY,
        )
    }

    // ------------------------------------------------------------------
    // Declaration shorthands
    // ------------------------------------------------------------------

    pub fn parameter(&self, name: &str, ty: TypeRef) -> Parameter {
        Parameter {
            id: self.ids.next(),
            span: Span::DUMMY,
            name: Symbol::intern(name),
            ty: Some(ty),
            default: None,
            by_ref: false,
        }
    }

    pub fn function(
        &self,
        name: &str,
        params: Vec<Parameter>,
        return_type: TypeRef,
        body: Vec<Stmt>,
    ) -> Decl {
        self.decl(
            DeclKind::Callable(CallableDecl {
                name: Symbol::intern(name),
                kind: CallableKind::Function,
                generic_params: Vec::new(),
                params,
                return_type: Some(return_type),
                implements: None,
                modifiers: Modifiers::default(),
                body: Some(Block::new(body)),
                is_extension: false,
            }),
            Span::DUMMY,
        )
    }

    pub fn subroutine(&self, name: &str, params: Vec<Parameter>, body: Vec<Stmt>) -> Decl {
        self.decl(
            DeclKind::Callable(CallableDecl {
                name: Symbol::intern(name),
                kind: CallableKind::Subroutine,
                generic_params: Vec::new(),
                params,
                return_type: None,
                implements: None,
                modifiers: Modifiers::default(),
                body: Some(Block::new(body)),
                is_extension: false,
            }),
            Span::DUMMY,
        )
    }

    pub fn global_var(&self, name: &str, ty: Option<TypeRef>, init: Option<Expr>) -> Decl {
        let is_auto = ty.is_none();
        self.decl(
            DeclKind::Variable(VariableDecl {
                name: Symbol::intern(name),
                ty,
                init,
                is_auto,
                is_static: false,
                access: AccessLevel::Public,
            }),
            Span::DUMMY,
        )
    }
}
