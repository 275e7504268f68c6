//! Expression typing.
//!
//! Every expression visit returns the resolved type and records it in the
//! node side table; identifier and member nodes additionally record their
//! resolved symbol. Recovery is through the error type, which is assignable
//! in both directions, so one bad subexpression does not cascade.

use crate::analysis::Analyzer;
use crate::scope::ScopeKind;
use crate::symbols::{SymbolInfo, SymbolKind};
use crate::types::{TupleElem, TypeId, TypeKind};
use basc_ast as ast;
use basc_ast::{BinOp, ExprKind, UnOp};
use basc_util::diagnostic::codes;
use basc_util::Symbol;

impl<'a> Analyzer<'a> {
    /// Type an expression, recording the result in the node table.
    pub(crate) fn infer_expr(&mut self, expr: &ast::Expr) -> TypeId {
        let ty = self.infer_expr_kind(expr);
        self.node_types.insert(expr.id, ty);
        ty
    }

    fn infer_expr_kind(&mut self, expr: &ast::Expr) -> TypeId {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                ast::Literal::Integer(_) => self.types.integer(),
                ast::Literal::Float(_) => self.types.double(),
                ast::Literal::Str(_) => self.types.string(),
                ast::Literal::Bool(_) => self.types.boolean(),
                ast::Literal::Char(_) => self.types.char(),
                ast::Literal::Null => self.types.null(),
            },

            ExprKind::Identifier(name) => match self.scopes.resolve(*name) {
                Some(sym) => {
                    self.node_symbols.insert(expr.id, sym);
                    self.symbols.get(sym).ty
                }
                None => {
                    self.error(
                        codes::E_UNDEFINED_SYMBOL,
                        format!("undefined symbol `{}`", name),
                        expr.span,
                    );
                    self.types.error()
                }
            },

            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(expr, *op, lhs, rhs),

            ExprKind::Unary { op, operand, .. } => {
                let operand_ty = self.infer_expr(operand);
                match op {
                    UnOp::Neg | UnOp::Inc | UnOp::Dec => {
                        if !self.types.is_numeric(operand_ty) && !self.types.is_error(operand_ty) {
                            self.error(
                                codes::E_NON_NUMERIC_OPERAND,
                                format!(
                                    "unary {:?} requires a numeric operand, found `{}`",
                                    op,
                                    self.types.name_of(operand_ty)
                                ),
                                expr.span,
                            );
                            return self.types.error();
                        }
                        operand_ty
                    }
                    UnOp::Not => {
                        if !self.types.is_boolean(operand_ty) {
                            self.warning(
                                codes::W_NON_BOOLEAN_CONDITION,
                                format!(
                                    "Not applied to `{}`",
                                    self.types.name_of(operand_ty)
                                ),
                                expr.span,
                            );
                        }
                        self.types.boolean()
                    }
                    UnOp::BitwiseNot => {
                        if !self.types.is_integral(operand_ty) && !self.types.is_error(operand_ty) {
                            self.error(
                                codes::E_NON_NUMERIC_OPERAND,
                                "bitwise Not requires an integral operand",
                                expr.span,
                            );
                            return self.types.error();
                        }
                        operand_ty
                    }
                }
            }

            ExprKind::InterpolatedString(parts) => {
                for part in parts {
                    if let ast::InterpPart::Expr(e) = part {
                        self.infer_expr(e);
                    }
                }
                self.types.string()
            }

            ExprKind::MemberAccess { object, member } => {
                self.infer_member_access(expr, object, *member)
            }

            ExprKind::Call {
                callee,
                args,
                generic_args: _,
            } => self.infer_call(expr, callee, args),

            ExprKind::ArrayAccess { base, indices } => {
                let base_ty = self.infer_expr(base);
                for index in indices {
                    let index_ty = self.infer_expr(index);
                    if !self.types.is_integral(index_ty) && !self.types.is_error(index_ty) {
                        self.error(
                            codes::E_BAD_ARRAY_INDEX,
                            format!(
                                "array index must be integral, found `{}`",
                                self.types.name_of(index_ty)
                            ),
                            index.span,
                        );
                    }
                }
                match self.types.kind_of(self.types.resolve_alias(base_ty)) {
                    TypeKind::Array { elem, rank, .. } => {
                        if indices.len() as u32 != *rank {
                            let rank = *rank;
                            let elem = *elem;
                            self.error(
                                codes::E_BAD_ARRAY_INDEX,
                                format!(
                                    "array of rank {} indexed with {} indices",
                                    rank,
                                    indices.len()
                                ),
                                expr.span,
                            );
                            return elem;
                        }
                        *elem
                    }
                    TypeKind::Error => self.types.error(),
                    _ => {
                        self.error(
                            codes::E_TYPE_MISMATCH,
                            format!(
                                "`{}` is not an array",
                                self.types.name_of(base_ty)
                            ),
                            expr.span,
                        );
                        self.types.error()
                    }
                }
            }

            ExprKind::New { ty, args } => {
                for arg in args {
                    self.infer_expr(arg);
                }
                self.resolve_type_ref(ty, expr.span)
            }

            ExprKind::Cast { ty, expr: inner } => {
                let source = self.infer_expr(inner);
                let target = self.resolve_type_ref(ty, expr.span);
                let ok = self.types.are_compatible(source, target)
                    || (self.types.is_numeric(source) && self.types.is_numeric(target));
                if !ok && !self.types.is_error(source) && !self.types.is_error(target) {
                    self.error(
                        codes::E_INVALID_CAST,
                        format!(
                            "cannot cast `{}` to `{}`",
                            self.types.name_of(source),
                            self.types.name_of(target)
                        ),
                        expr.span,
                    );
                }
                target
            }

            ExprKind::MyBase => match self.current_class {
                Some(class_ty) => match self.types.kind_of(class_ty) {
                    TypeKind::Class {
                        base: Some(base), ..
                    } => *base,
                    _ => {
                        self.error(
                            codes::E_MYBASE_OUTSIDE_DERIVED,
                            "MyBase in a class with no base class",
                            expr.span,
                        );
                        self.types.error()
                    }
                },
                None => {
                    self.error(
                        codes::E_MYBASE_OUTSIDE_DERIVED,
                        "MyBase outside a class",
                        expr.span,
                    );
                    self.types.error()
                }
            },

            ExprKind::WithSubject => match self.with_stack.last() {
                Some(ty) => *ty,
                None => {
                    self.error(
                        codes::E_UNDEFINED_SYMBOL,
                        "leading-dot member access outside a With statement",
                        expr.span,
                    );
                    self.types.error()
                }
            },

            ExprKind::Lambda(lambda) => self.infer_lambda(expr, lambda),

            ExprKind::Await(inner) => self.infer_expr(inner),

            ExprKind::CollectionInit { elements } => {
                let elem_tys: Vec<TypeId> = elements.iter().map(|e| self.infer_expr(e)).collect();
                let elem_ty = match elem_tys.first() {
                    Some(first) => {
                        let mixed = elem_tys.iter().any(|t| !self.types.are_compatible(*first, *t));
                        if mixed {
                            self.warning(
                                codes::W_MIXED_COLLECTION,
                                "collection literal mixes unrelated element types",
                                expr.span,
                            );
                            self.types.object()
                        } else {
                            elem_tys
                                .iter()
                                .skip(1)
                                .fold(*first, |acc, t| {
                                    self.types.common_numeric_type(acc, *t).unwrap_or(acc)
                                })
                        }
                    }
                    None => self.types.object(),
                };
                self.types.array_of(elem_ty, 1)
            }

            ExprKind::TupleLiteral { elements } => {
                let elems: Vec<TupleElem> = elements
                    .iter()
                    .map(|(name, e)| TupleElem {
                        name: *name,
                        ty: self.infer_expr(e),
                    })
                    .collect();
                self.types.tuple_of(elems)
            }
        }
    }

    fn infer_binary(
        &mut self,
        expr: &ast::Expr,
        op: BinOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> TypeId {
        let lhs_ty = self.infer_expr(lhs);
        let rhs_ty = self.infer_expr(rhs);

        if self.types.is_error(lhs_ty) || self.types.is_error(rhs_ty) {
            return self.types.error();
        }

        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                match self.types.common_numeric_type(lhs_ty, rhs_ty) {
                    Some(common) => common,
                    None => {
                        self.error(
                            codes::E_NON_NUMERIC_OPERAND,
                            format!(
                                "arithmetic on `{}` and `{}`",
                                self.types.name_of(lhs_ty),
                                self.types.name_of(rhs_ty)
                            ),
                            expr.span,
                        );
                        self.types.error()
                    }
                }
            }

            BinOp::IntDiv => {
                if self.types.is_integral(lhs_ty) && self.types.is_integral(rhs_ty) {
                    self.types
                        .common_numeric_type(lhs_ty, rhs_ty)
                        .unwrap_or(self.types.integer())
                } else {
                    self.error(
                        codes::E_NON_NUMERIC_OPERAND,
                        "integer division requires integral operands",
                        expr.span,
                    );
                    self.types.error()
                }
            }

            BinOp::Concat => {
                // At least one operand must already be a String; the other is
                // stringified on demand by the backend.
                if !self.types.is_string(lhs_ty) && !self.types.is_string(rhs_ty) {
                    self.error(
                        codes::E_CONCAT_WITHOUT_STRING,
                        format!(
                            "`&` requires at least one String operand, found `{}` and `{}`",
                            self.types.name_of(lhs_ty),
                            self.types.name_of(rhs_ty)
                        ),
                        expr.span,
                    );
                }
                self.types.string()
            }

            BinOp::And | BinOp::Or | BinOp::Xor => {
                if self.types.is_boolean(lhs_ty) && self.types.is_boolean(rhs_ty) {
                    self.types.boolean()
                } else if self.types.is_integral(lhs_ty) && self.types.is_integral(rhs_ty) {
                    self.types
                        .common_numeric_type(lhs_ty, rhs_ty)
                        .unwrap_or(self.types.integer())
                } else {
                    self.error(
                        codes::E_NON_NUMERIC_OPERAND,
                        format!(
                            "{:?} requires Boolean or integral operands",
                            op
                        ),
                        expr.span,
                    );
                    self.types.error()
                }
            }

            BinOp::Shl | BinOp::Shr => {
                if self.types.is_integral(lhs_ty) && self.types.is_integral(rhs_ty) {
                    lhs_ty
                } else {
                    self.error(
                        codes::E_NON_NUMERIC_OPERAND,
                        "shift requires integral operands",
                        expr.span,
                    );
                    self.types.error()
                }
            }

            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if !self.types.are_compatible(lhs_ty, rhs_ty) {
                    self.warning(
                        codes::W_INCOMPARABLE_TYPES,
                        format!(
                            "comparing unrelated types `{}` and `{}`",
                            self.types.name_of(lhs_ty),
                            self.types.name_of(rhs_ty)
                        ),
                        expr.span,
                    );
                }
                self.types.boolean()
            }
        }
    }

    fn infer_member_access(
        &mut self,
        expr: &ast::Expr,
        object: &ast::Expr,
        member: Symbol,
    ) -> TypeId {
        // Enum member access: EnumName.Member
        if let ExprKind::Identifier(type_name) = &object.kind {
            if let Some(ty) = self.types.lookup(*type_name) {
                if let TypeKind::Enum { members, .. } = self.types.kind_of(ty) {
                    if members.contains_key(&member) {
                        self.node_types.insert(object.id, ty);
                        return ty;
                    }
                    self.error(
                        codes::E_UNDEFINED_SYMBOL,
                        format!("enum `{}` has no member `{}`", type_name, member),
                        expr.span,
                    );
                    return self.types.error();
                }
            }
        }

        let object_ty = self.infer_expr(object);
        self.member_type(object_ty, member, expr)
    }

    /// Look up a member on a type, walking the class base chain.
    fn member_type(&mut self, object_ty: TypeId, member: Symbol, expr: &ast::Expr) -> TypeId {
        let resolved = self.types.resolve_alias(object_ty);
        match self.types.kind_of(resolved) {
            TypeKind::Class { .. } => {
                let mut current = resolved;
                loop {
                    let (found, base) = match self.types.kind_of(current) {
                        TypeKind::Class { members, base, .. } => {
                            (members.get(&member).copied(), *base)
                        }
                        _ => (None, None),
                    };
                    if let Some(sym) = found {
                        self.node_symbols.insert(expr.id, sym);
                        let info = self.symbols.get(sym);
                        return if info.is_callable() {
                            info.return_type.unwrap_or(self.types.void())
                        } else {
                            info.ty
                        };
                    }
                    match base {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
                self.error(
                    codes::E_UNDEFINED_SYMBOL,
                    format!(
                        "`{}` has no member `{}`",
                        self.types.name_of(object_ty),
                        member
                    ),
                    expr.span,
                );
                self.types.error()
            }
            TypeKind::Interface { members } => match members.get(&member).copied() {
                Some(sym) => {
                    self.node_symbols.insert(expr.id, sym);
                    let info = self.symbols.get(sym);
                    if info.is_callable() {
                        info.return_type.unwrap_or(self.types.void())
                    } else {
                        info.ty
                    }
                }
                None => {
                    self.error(
                        codes::E_UNDEFINED_SYMBOL,
                        format!(
                            "interface `{}` has no member `{}`",
                            self.types.name_of(object_ty),
                            member
                        ),
                        expr.span,
                    );
                    self.types.error()
                }
            },
            TypeKind::Structure { fields } => {
                match fields.iter().find(|(name, _)| *name == member) {
                    Some((_, ty)) => *ty,
                    None => {
                        self.error(
                            codes::E_UNDEFINED_SYMBOL,
                            format!(
                                "structure `{}` has no field `{}`",
                                self.types.name_of(object_ty),
                                member
                            ),
                            expr.span,
                        );
                        self.types.error()
                    }
                }
            }
            TypeKind::Tuple { elems } => {
                match elems.iter().find(|e| e.name == Some(member)) {
                    Some(elem) => elem.ty,
                    None => {
                        self.error(
                            codes::E_UNDEFINED_SYMBOL,
                            format!("tuple has no element `{}`", member),
                            expr.span,
                        );
                        self.types.error()
                    }
                }
            }
            // Length on arrays and strings, ToString on everything.
            TypeKind::Array { .. } if member.eq_str("Length") => self.types.integer(),
            TypeKind::String if member.eq_str("Length") => self.types.integer(),
            TypeKind::Error => self.types.error(),
            _ if member.eq_str("ToString") => self.types.string(),
            _ => {
                self.error(
                    codes::E_UNDEFINED_SYMBOL,
                    format!(
                        "`{}` has no member `{}`",
                        self.types.name_of(object_ty),
                        member
                    ),
                    expr.span,
                );
                self.types.error()
            }
        }
    }

    fn infer_call(&mut self, expr: &ast::Expr, callee: &ast::Expr, args: &[ast::Expr]) -> TypeId {
        let arg_tys: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a)).collect();

        match &callee.kind {
            ExprKind::Identifier(name) => {
                // Standard-library call: signature comes from the unified
                // table, the same one the emitter reads templates from.
                if let Some(def) = self.stdlib.get(*name) {
                    let params = def.params.clone();
                    let ret = def.ret;
                    self.check_args(*name, &params, &arg_tys, args, expr);
                    return ret;
                }

                match self.scopes.resolve(*name) {
                    Some(sym) => {
                        self.node_symbols.insert(expr.id, sym);
                        self.node_symbols.insert(callee.id, sym);
                        let info = self.symbols.get(sym);
                        if info.is_callable() {
                            let params: Vec<TypeId> =
                                info.params.iter().map(|p| p.ty).collect();
                            let ret = info.return_type.unwrap_or(self.types.void());
                            self.check_args(*name, &params, &arg_tys, args, expr);
                            ret
                        } else if matches!(
                            self.types.kind_of(self.symbols.get(sym).ty),
                            TypeKind::Delegate { .. }
                        ) {
                            // Invoking a delegate-typed value.
                            let (params, ret) = match self.types.kind_of(self.symbols.get(sym).ty)
                            {
                                TypeKind::Delegate { params, ret } => (params.clone(), *ret),
                                _ => unreachable!(),
                            };
                            self.check_args(*name, &params, &arg_tys, args, expr);
                            ret
                        } else {
                            self.error(
                                codes::E_TYPE_MISMATCH,
                                format!("`{}` is not callable", name),
                                expr.span,
                            );
                            self.types.error()
                        }
                    }
                    None => {
                        self.error(
                            codes::E_UNDEFINED_SYMBOL,
                            format!("undefined function `{}`", name),
                            expr.span,
                        );
                        self.types.error()
                    }
                }
            }

            ExprKind::MemberAccess { object, member } => {
                // Static call ClassName.Method(...) when the name resolves to
                // a class and is not shadowed by a local value.
                if let ExprKind::Identifier(type_name) = &object.kind {
                    let shadowed = self
                        .scopes
                        .resolve(*type_name)
                        .map(|s| !self.symbols.get(s).is_type_like())
                        .unwrap_or(false);
                    if !shadowed {
                        if let Some(class_ty) = self.types.lookup(*type_name) {
                            if matches!(self.types.kind_of(class_ty), TypeKind::Class { .. }) {
                                self.node_types.insert(object.id, class_ty);
                                return self.check_method_call(
                                    class_ty, *member, &arg_tys, args, expr,
                                );
                            }
                        }
                    }
                }

                let object_ty = self.infer_expr(object);
                if member.eq_str("ToString") {
                    return self.types.string();
                }
                self.check_method_call(object_ty, *member, &arg_tys, args, expr)
            }

            // Calling through any other expression (lambda result, etc.):
            // type it and call through its delegate type if it has one.
            _ => {
                let callee_ty = self.infer_expr(callee);
                match self.types.kind_of(self.types.resolve_alias(callee_ty)) {
                    TypeKind::Delegate { params, ret } => {
                        let params = params.clone();
                        let ret = *ret;
                        self.check_args(Symbol::intern("<delegate>"), &params, &arg_tys, args, expr);
                        ret
                    }
                    TypeKind::Error => self.types.error(),
                    _ => {
                        self.error(
                            codes::E_TYPE_MISMATCH,
                            "expression is not callable",
                            expr.span,
                        );
                        self.types.error()
                    }
                }
            }
        }
    }

    /// Resolve and check a method call on a receiver type.
    fn check_method_call(
        &mut self,
        receiver: TypeId,
        method: Symbol,
        arg_tys: &[TypeId],
        args: &[ast::Expr],
        expr: &ast::Expr,
    ) -> TypeId {
        let resolved = self.types.resolve_alias(receiver);
        let mut current = resolved;
        loop {
            let (found, base) = match self.types.kind_of(current) {
                TypeKind::Class { members, base, .. } => (members.get(&method).copied(), *base),
                TypeKind::Interface { members } => (members.get(&method).copied(), None),
                TypeKind::Error => return self.types.error(),
                _ => (None, None),
            };
            if let Some(sym) = found {
                self.node_symbols.insert(expr.id, sym);
                let info = self.symbols.get(sym);
                if !info.is_callable() {
                    self.error(
                        codes::E_TYPE_MISMATCH,
                        format!("member `{}` is not callable", method),
                        expr.span,
                    );
                    return self.types.error();
                }
                let params: Vec<TypeId> = info.params.iter().map(|p| p.ty).collect();
                let ret = info.return_type.unwrap_or(self.types.void());
                self.check_args(method, &params, arg_tys, args, expr);
                return ret;
            }
            match base {
                Some(parent) => current = parent,
                None => break,
            }
        }
        self.error(
            codes::E_UNDEFINED_SYMBOL,
            format!(
                "`{}` has no method `{}`",
                self.types.name_of(receiver),
                method
            ),
            expr.span,
        );
        self.types.error()
    }

    /// Exact-arity and per-argument assignability check.
    fn check_args(
        &mut self,
        name: Symbol,
        params: &[TypeId],
        arg_tys: &[TypeId],
        args: &[ast::Expr],
        expr: &ast::Expr,
    ) {
        if params.len() != arg_tys.len() {
            self.error(
                codes::E_WRONG_ARITY,
                format!(
                    "`{}` expects {} argument(s), found {}",
                    name,
                    params.len(),
                    arg_tys.len()
                ),
                expr.span,
            );
            return;
        }
        for (i, (&param, &arg)) in params.iter().zip(arg_tys.iter()).enumerate() {
            if !self.types.is_assignable_from(param, arg) {
                self.error(
                    codes::E_TYPE_MISMATCH,
                    format!(
                        "argument {} of `{}`: expected `{}`, found `{}`",
                        i + 1,
                        name,
                        self.types.name_of(param),
                        self.types.name_of(arg)
                    ),
                    args[i].span,
                );
            }
        }
    }

    fn infer_lambda(&mut self, expr: &ast::Expr, lambda: &ast::LambdaExpr) -> TypeId {
        self.scopes
            .enter(Symbol::intern("<lambda>"), ScopeKind::Function);

        let mut param_tys = Vec::new();
        for param in &lambda.params {
            let ty = self.resolve_param_type(param);
            param_tys.push(ty);
            let sym = self.symbols.alloc(SymbolInfo::new(
                param.name,
                SymbolKind::Parameter,
                ty,
                param.span,
            ));
            self.define_checked(param.name, sym, param.span);
            self.node_symbols.insert(param.id, sym);
            self.node_types.insert(param.id, ty);
        }

        let ret = match &lambda.body {
            ast::LambdaBody::Expr(body) => {
                if lambda.is_sub {
                    self.infer_expr(body);
                    self.types.void()
                } else {
                    self.infer_expr(body)
                }
            }
            ast::LambdaBody::Block(block) => {
                for stmt in &block.stmts {
                    self.analyze_stmt(stmt);
                }
                self.types.void()
            }
        };

        self.scopes.exit();

        self.lambda_counter += 1;
        let name = Symbol::intern(&format!("<lambda{}>", self.lambda_counter));
        let ty = self.types.intern(
            name,
            TypeKind::Delegate {
                params: param_tys,
                ret,
            },
        );
        let _ = expr;
        ty
    }
}
