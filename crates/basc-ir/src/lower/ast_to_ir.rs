//! Lowering of the annotated AST into the basic-block IR.
//!
//! The lowerer trusts the analysis completely: semantic errors were filtered
//! before it runs, and every expression node carries a resolved type. Each
//! expression visit returns its [`Value`]; each statement visit appends
//! instructions through the [`FunctionBuilder`] and may create or switch
//! blocks. Statements following a terminator in the same block are dead and
//! are not lowered at all.

use crate::analysis::{rebuild_edges, verify_function};
use crate::builder::{FunctionBuilder, LoopCtx, LoopCtxKind};
use crate::ir::*;
use basc_ast as ast;
use basc_ast::{CasePatternKind, DeclKind, ExprKind, StmtKind};
use basc_sem::{Analysis, ConstValue, SymbolKind, TypeId, TypeKind};
use basc_util::{FxHashMap, Span, Symbol};
use thiserror::Error;

/// Options controlling lowering.
#[derive(Debug, Clone)]
pub struct LowerOptions {
    /// Run the temp-collapse rewrite after initial lowering. On by default;
    /// turning it off preserves the raw `t0 = a + b; x = t0` form for
    /// diagnostics.
    pub fold_assignments: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            fold_assignments: true,
        }
    }
}

/// Internal lowering failure: an invariant the analyzer should have
/// guaranteed did not hold.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("internal lowering error at {span}: {message}")]
    Internal { message: String, span: Span },

    #[error("CFG verification failed in `{func}`: {details}")]
    MalformedCfg { func: Symbol, details: String },
}

/// Lower an analyzed program to an IR module.
pub fn lower_program(
    program: &ast::Program,
    analysis: &Analysis,
    options: &LowerOptions,
) -> Result<Module, LowerError> {
    let mut lowerer = ModuleLowerer {
        analysis,
        options,
        module: Module::new(),
        pending: Vec::new(),
        lambda_counter: 0,
    };

    for decl in &program.decls {
        lowerer.lower_decl(decl)?;
    }

    let pending = std::mem::take(&mut lowerer.pending);
    for func in pending {
        lowerer.module.add_function(func);
    }

    Ok(lowerer.module)
}

/// Per-function lowering context.
struct Cx {
    /// Enclosing class, for field and method dispatch.
    class: Option<ClassCx>,
    /// Values of enclosing With subjects, innermost last.
    with_stack: Vec<Value>,
    /// Counter naming With subject temporaries.
    with_counter: u32,
}

#[derive(Clone)]
struct ClassCx {
    name: Symbol,
    ty: TypeId,
}

impl Cx {
    fn free() -> Self {
        Self {
            class: None,
            with_stack: Vec::new(),
            with_counter: 0,
        }
    }

    fn in_class(name: Symbol, ty: TypeId) -> Self {
        Self {
            class: Some(ClassCx { name, ty }),
            with_stack: Vec::new(),
            with_counter: 0,
        }
    }
}

struct ModuleLowerer<'a> {
    analysis: &'a Analysis,
    options: &'a LowerOptions,
    module: Module,
    /// Lambdas hoisted out of the function currently being lowered.
    pending: Vec<Function>,
    lambda_counter: u32,
}

impl<'a> ModuleLowerer<'a> {
    fn internal(&self, message: impl Into<String>, span: Span) -> LowerError {
        LowerError::Internal {
            message: message.into(),
            span,
        }
    }

    /// Type annotation of a node; Object when the analyzer left none (only
    /// callee sub-nodes are legitimately unannotated).
    fn ty(&self, node: basc_util::NodeId) -> TypeId {
        self.analysis
            .type_of(node)
            .unwrap_or_else(|| self.analysis.types.object())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn lower_decl(&mut self, decl: &ast::Decl) -> Result<(), LowerError> {
        match &decl.kind {
            DeclKind::Namespace(ns) => {
                for d in &ns.decls {
                    self.lower_decl(d)?;
                }
                Ok(())
            }
            DeclKind::Module(m) => {
                for d in &m.decls {
                    self.lower_decl(d)?;
                }
                Ok(())
            }
            DeclKind::Import(import) => {
                self.module.imports.push(import.path);
                Ok(())
            }
            DeclKind::Class(class) => self.lower_class(decl, class),
            DeclKind::Interface(iface) => self.lower_interface(iface),
            DeclKind::Enum(en) => {
                self.lower_enum(en);
                Ok(())
            }
            DeclKind::Structure(st) => {
                self.lower_structure(decl, st);
                Ok(())
            }
            DeclKind::Callable(callable) => {
                let func = self.lower_callable(callable.name, decl.id, callable, Cx::free())?;
                self.module.add_function(func);
                Ok(())
            }
            DeclKind::Extern(ext) => {
                self.lower_extern(decl, ext);
                Ok(())
            }
            DeclKind::Delegate(del) => {
                self.lower_delegate(decl, del);
                Ok(())
            }
            DeclKind::Variable(var) => {
                let ty = self.ty(decl.id);
                let init = var.init.as_ref().and_then(|e| self.const_value(e));
                self.module.globals.push(GlobalMeta {
                    name: var.name,
                    ty,
                    init,
                });
                Ok(())
            }
            DeclKind::Constant(c) => {
                let ty = self.ty(decl.id);
                let init = self.const_value(&c.value);
                self.module.globals.push(GlobalMeta {
                    name: c.name,
                    ty,
                    init,
                });
                Ok(())
            }
            // Aliases are fully resolved during analysis.
            DeclKind::TypeAlias(_) => Ok(()),
            DeclKind::Property(_)
            | DeclKind::Event(_)
            | DeclKind::Operator(_)
            | DeclKind::Constructor(_) => Err(self.internal(
                "class member declaration survived analysis at top level",
                decl.span,
            )),
        }
    }

    fn lower_class(&mut self, decl: &ast::Decl, class: &ast::ClassDecl) -> Result<(), LowerError> {
        let class_ty = self
            .analysis
            .types
            .lookup(class.name)
            .ok_or_else(|| self.internal("class type missing from analysis", decl.span))?;

        let mut meta = ClassMeta::new(class.name);
        meta.base = class.base;
        meta.interfaces = class.interfaces.clone();
        meta.generic_params = class.generic_params.clone();

        let mut ctor_index = 0u32;
        for member in &class.members {
            match &member.kind {
                DeclKind::Variable(var) => {
                    meta.fields.push(FieldMeta {
                        name: var.name,
                        ty: self.ty(member.id),
                        is_static: var.is_static,
                        init: var.init.as_ref().and_then(|e| self.const_value(e)),
                    });
                }
                DeclKind::Constant(c) => {
                    meta.fields.push(FieldMeta {
                        name: c.name,
                        ty: self.ty(member.id),
                        is_static: true,
                        init: self.const_value(&c.value),
                    });
                }
                DeclKind::Callable(callable) => {
                    let key = Symbol::intern(&format!("{}.{}", class.name, callable.name));
                    let func = self.lower_callable(
                        key,
                        member.id,
                        callable,
                        Cx::in_class(class.name, class_ty),
                    )?;
                    self.module.add_function(func);
                    meta.methods.push(MethodMeta {
                        name: callable.name,
                        func: key,
                        is_static: callable.modifiers.is_static,
                        is_override: callable.modifiers.is_override,
                    });
                }
                DeclKind::Constructor(ctor) => {
                    let key = if ctor_index == 0 {
                        Symbol::intern(&format!("{}.New", class.name))
                    } else {
                        Symbol::intern(&format!("{}.New{}", class.name, ctor_index))
                    };
                    ctor_index += 1;
                    let (func, base_args) =
                        self.lower_constructor(key, ctor, Cx::in_class(class.name, class_ty))?;
                    self.module.add_function(func);
                    meta.constructors.push(key);
                    if !base_args.is_empty() {
                        meta.base_ctor_args = base_args;
                    }
                }
                DeclKind::Property(prop) => {
                    let ty = self.ty(member.id);
                    let getter = match &prop.getter {
                        Some(body) => {
                            let key =
                                Symbol::intern(&format!("{}.get_{}", class.name, prop.name));
                            let func = self.lower_accessor(
                                key,
                                body,
                                ty,
                                None,
                                Cx::in_class(class.name, class_ty),
                            )?;
                            self.module.add_function(func);
                            Some(key)
                        }
                        None => None,
                    };
                    let setter = match &prop.setter {
                        Some(body) => {
                            let key =
                                Symbol::intern(&format!("{}.set_{}", class.name, prop.name));
                            let value_param = prop
                                .setter_param
                                .unwrap_or_else(|| Symbol::intern("value"));
                            let func = self.lower_accessor(
                                key,
                                body,
                                self.analysis.types.void(),
                                Some((value_param, ty)),
                                Cx::in_class(class.name, class_ty),
                            )?;
                            self.module.add_function(func);
                            Some(key)
                        }
                        None => None,
                    };
                    meta.properties.push(PropertyMeta {
                        name: prop.name,
                        ty,
                        getter,
                        setter,
                    });
                }
                DeclKind::Event(event) => {
                    meta.events.push(EventMeta {
                        name: event.name,
                        delegate: self.ty(member.id),
                    });
                }
                DeclKind::Operator(op) => {
                    let key = Symbol::intern(&format!(
                        "{}.{}",
                        class.name,
                        operator_method_name(op.symbol)
                    ));
                    let func =
                        self.lower_operator(key, member.id, op, Cx::in_class(class.name, class_ty))?;
                    self.module.add_function(func);
                    meta.methods.push(MethodMeta {
                        name: Symbol::intern(operator_method_name(op.symbol).as_str()),
                        func: key,
                        is_static: true,
                        is_override: false,
                    });
                }
                _ => {}
            }
        }

        self.module.classes.insert(class.name, meta);
        Ok(())
    }

    fn lower_interface(&mut self, iface: &ast::InterfaceDecl) -> Result<(), LowerError> {
        let mut methods = Vec::new();
        for member in &iface.members {
            if let DeclKind::Callable(callable) = &member.kind {
                let params = self.callable_params(callable);
                let ret = self.callable_return(member.id, callable);
                let default_impl = match &callable.body {
                    Some(_) => {
                        let key =
                            Symbol::intern(&format!("{}.{}", iface.name, callable.name));
                        let func = self.lower_callable(key, member.id, callable, Cx::free())?;
                        self.module.add_function(func);
                        Some(key)
                    }
                    None => None,
                };
                methods.push(InterfaceMethodMeta {
                    name: callable.name,
                    params,
                    ret,
                    default_impl,
                });
            }
        }
        self.module.interfaces.insert(
            iface.name,
            InterfaceMeta {
                name: iface.name,
                methods,
            },
        );
        Ok(())
    }

    fn lower_enum(&mut self, en: &ast::EnumDecl) {
        let (underlying, members) = match self
            .analysis
            .types
            .lookup(en.name)
            .map(|id| self.analysis.types.kind_of(id))
        {
            Some(TypeKind::Enum {
                underlying,
                members,
            }) => (
                *underlying,
                members.iter().map(|(n, v)| (*n, *v)).collect(),
            ),
            _ => (self.analysis.types.integer(), Vec::new()),
        };
        self.module.enums.insert(
            en.name,
            EnumMeta {
                name: en.name,
                underlying,
                members,
            },
        );
    }

    /// Structures carry only fields; they share the class metadata shape.
    fn lower_structure(&mut self, decl: &ast::Decl, st: &ast::StructureDecl) {
        let mut meta = ClassMeta::new(st.name);
        for field in &st.fields {
            let ty = self
                .analysis
                .types
                .lookup(st.name)
                .and_then(|id| match self.analysis.types.kind_of(id) {
                    TypeKind::Structure { fields } => fields
                        .iter()
                        .find(|(n, _)| *n == field.name)
                        .map(|(_, t)| *t),
                    _ => None,
                })
                .unwrap_or_else(|| self.analysis.types.object());
            meta.fields.push(FieldMeta {
                name: field.name,
                ty,
                is_static: false,
                init: None,
            });
        }
        let _ = decl;
        self.module.classes.insert(st.name, meta);
    }

    fn lower_delegate(&mut self, decl: &ast::Decl, del: &ast::DelegateDecl) {
        let (params, ret) = match self
            .analysis
            .types
            .lookup(del.name)
            .map(|id| self.analysis.types.kind_of(id))
        {
            Some(TypeKind::Delegate { params, ret }) => (
                del.params
                    .iter()
                    .zip(params.iter())
                    .map(|(p, ty)| Param {
                        name: p.name,
                        ty: *ty,
                    })
                    .collect(),
                *ret,
            ),
            _ => (Vec::new(), self.analysis.types.void()),
        };
        let _ = decl;
        self.module.delegates.insert(
            del.name,
            DelegateMeta {
                name: del.name,
                params,
                ret,
            },
        );
    }

    fn lower_extern(&mut self, decl: &ast::Decl, ext: &ast::ExternDecl) {
        let params = ext
            .params
            .iter()
            .map(|p| Param {
                name: p.name,
                ty: self
                    .analysis
                    .symbol_of(p.id)
                    .map(|s| self.analysis.symbols.get(s).ty)
                    .unwrap_or_else(|| self.analysis.types.object()),
            })
            .collect();
        let ret = self
            .analysis
            .symbol_of(decl.id)
            .and_then(|s| self.analysis.symbols.get(s).return_type)
            .filter(|t| !self.analysis.types.is_void(*t));
        self.module.externs.insert(
            ext.name,
            ExternMeta {
                name: ext.name,
                is_function: ext.is_function,
                params,
                ret,
                templates: ext.platforms.clone(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn callable_params(&self, callable: &ast::CallableDecl) -> Vec<Param> {
        callable
            .params
            .iter()
            .map(|p| Param {
                name: p.name,
                ty: self
                    .analysis
                    .symbol_of(p.id)
                    .map(|s| self.analysis.symbols.get(s).ty)
                    .unwrap_or_else(|| self.analysis.types.object()),
            })
            .collect()
    }

    /// Return type of a callable via its declaration node's annotation.
    fn callable_return(&self, decl_id: basc_util::NodeId, callable: &ast::CallableDecl) -> TypeId {
        match callable.kind {
            ast::CallableKind::Function => self.ty(decl_id),
            ast::CallableKind::Subroutine => self.analysis.types.void(),
        }
    }

    fn lower_callable(
        &mut self,
        key: Symbol,
        decl_id: basc_util::NodeId,
        callable: &ast::CallableDecl,
        mut cx: Cx,
    ) -> Result<Function, LowerError> {
        let ret = self.callable_return(decl_id, callable);

        let mut b = FunctionBuilder::new(key, ret);
        b.function.flags.is_async = callable.modifiers.is_async;
        b.function.flags.is_iterator = callable.modifiers.is_iterator;
        b.function.flags.is_extension = callable.is_extension;
        b.function.generic_params = callable.generic_params.clone();

        for param in self.callable_params(callable) {
            b.add_param(param.name, param.ty);
        }

        if let Some(body) = &callable.body {
            for stmt in &body.stmts {
                if b.is_terminated() {
                    break;
                }
                self.lower_stmt(&mut b, &mut cx, stmt)?;
            }
        } else {
            b.function.flags.is_external = true;
        }

        self.finish_function(b, ret)
    }

    fn lower_constructor(
        &mut self,
        key: Symbol,
        ctor: &ast::ConstructorDecl,
        mut cx: Cx,
    ) -> Result<(Function, Vec<Value>), LowerError> {
        let void = self.analysis.types.void();
        let mut b = FunctionBuilder::new(key, void);

        for p in &ctor.params {
            let ty = self
                .analysis
                .symbol_of(p.id)
                .map(|s| self.analysis.symbols.get(s).ty)
                .unwrap_or_else(|| self.analysis.types.object());
            b.add_param(p.name, ty);
        }

        // Base-constructor arguments are evaluated in the entry block and
        // stashed on the class metadata.
        let mut base_args = Vec::new();
        for arg in &ctor.base_args {
            base_args.push(self.lower_expr(&mut b, &mut cx, arg)?);
        }

        for stmt in &ctor.body.stmts {
            if b.is_terminated() {
                break;
            }
            self.lower_stmt(&mut b, &mut cx, stmt)?;
        }

        let func = self.finish_function(b, void)?;
        Ok((func, base_args))
    }

    fn lower_accessor(
        &mut self,
        key: Symbol,
        body: &ast::Block,
        ret: TypeId,
        value_param: Option<(Symbol, TypeId)>,
        mut cx: Cx,
    ) -> Result<Function, LowerError> {
        let mut b = FunctionBuilder::new(key, ret);
        if let Some((name, ty)) = value_param {
            b.add_param(name, ty);
        }
        for stmt in &body.stmts {
            if b.is_terminated() {
                break;
            }
            self.lower_stmt(&mut b, &mut cx, stmt)?;
        }
        self.finish_function(b, ret)
    }

    fn lower_operator(
        &mut self,
        key: Symbol,
        decl_id: basc_util::NodeId,
        op: &ast::OperatorDecl,
        mut cx: Cx,
    ) -> Result<Function, LowerError> {
        let ret = self.ty(decl_id);
        let mut b = FunctionBuilder::new(key, ret);
        for p in &op.params {
            let ty = self
                .analysis
                .symbol_of(p.id)
                .map(|s| self.analysis.symbols.get(s).ty)
                .unwrap_or_else(|| self.analysis.types.object());
            b.add_param(p.name, ty);
        }
        for stmt in &op.body.stmts {
            if b.is_terminated() {
                break;
            }
            self.lower_stmt(&mut b, &mut cx, stmt)?;
        }
        self.finish_function(b, ret)
    }

    /// Seal a function: default return on the open exit, edge rebuild, the
    /// optional temp-collapse rewrite, and CFG verification.
    fn finish_function(
        &mut self,
        mut b: FunctionBuilder,
        ret: TypeId,
    ) -> Result<Function, LowerError> {
        if !b.is_terminated() {
            let value = if self.analysis.types.is_void(ret) {
                None
            } else {
                Some(Value::Constant(self.default_value(ret)))
            };
            b.emit_effect(
                InstKind::Return { value },
                self.analysis.types.void(),
                Span::DUMMY,
            );
        }

        let mut func = b.build();
        rebuild_edges(&mut func);

        if self.options.fold_assignments {
            let folded = fold_definitions_into_assignments(&mut func);
            if folded > 0 {
                log::trace!("folded {} temp definitions in {}", folded, func.name);
            }
        }

        if let Err(violations) = verify_function(&func) {
            return Err(LowerError::MalformedCfg {
                func: func.name,
                details: violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }
        Ok(func)
    }

    fn default_value(&self, ty: TypeId) -> ConstValue {
        let types = &self.analysis.types;
        if types.is_integral(ty) {
            ConstValue::Int(0)
        } else if types.is_numeric(ty) {
            ConstValue::Float(0.0)
        } else if types.is_boolean(ty) {
            ConstValue::Bool(false)
        } else if matches!(types.kind_of(types.resolve_alias(ty)), TypeKind::Char) {
            ConstValue::Char('\0')
        } else {
            ConstValue::Null
        }
    }

    /// Constant value of an expression, when it is one.
    fn const_value(&self, expr: &ast::Expr) -> Option<Value> {
        self.const_eval(expr).map(Value::Constant)
    }

    fn const_eval(&self, expr: &ast::Expr) -> Option<ConstValue> {
        match &expr.kind {
            ExprKind::Literal(lit) => Some(match lit {
                ast::Literal::Integer(v) => ConstValue::Int(*v),
                ast::Literal::Float(v) => ConstValue::Float(*v),
                ast::Literal::Str(v) => ConstValue::Str(v.clone()),
                ast::Literal::Bool(v) => ConstValue::Bool(*v),
                ast::Literal::Char(v) => ConstValue::Char(*v),
                ast::Literal::Null => ConstValue::Null,
            }),
            ExprKind::Unary {
                op: ast::UnOp::Neg,
                operand,
                ..
            } => match self.const_eval(operand)? {
                ConstValue::Int(v) => Some(ConstValue::Int(-v)),
                ConstValue::Float(v) => Some(ConstValue::Float(-v)),
                _ => None,
            },
            ExprKind::Identifier(_) => {
                let sym = self.analysis.symbol_of(expr.id)?;
                let info = self.analysis.symbols.get(sym);
                if info.flags.is_constant {
                    info.const_value.clone()
                } else {
                    None
                }
            }
            ExprKind::MemberAccess { object, member } => {
                if let ExprKind::Identifier(type_name) = &object.kind {
                    let ty = self.analysis.types.lookup(*type_name)?;
                    if let TypeKind::Enum { members, .. } = self.analysis.types.kind_of(ty) {
                        return members.get(member).map(|v| ConstValue::Int(*v));
                    }
                }
                None
            }
            _ => None,
        }
    }
}

impl<'a> ModuleLowerer<'a> {
    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn lower_stmt(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        stmt: &ast::Stmt,
    ) -> Result<(), LowerError> {
        match &stmt.kind {
            StmtKind::Block(block) => self.lower_scoped_block(b, cx, block),

            StmtKind::Local(var) => {
                let ty = self.ty(stmt.id);
                let versioned = b.declare_local(var.name, ty);
                if let Some(init) = &var.init {
                    let value = self.lower_expr(b, cx, init)?;
                    b.emit_effect(
                        InstKind::Assign {
                            target: versioned,
                            value,
                        },
                        ty,
                        stmt.span,
                    );
                }
                Ok(())
            }

            StmtKind::LocalConst(c) => {
                let ty = self.ty(stmt.id);
                let versioned = b.declare_local(c.name, ty);
                let value = self.lower_expr(b, cx, &c.value)?;
                b.emit_effect(
                    InstKind::Assign {
                        target: versioned,
                        value,
                    },
                    ty,
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::Assignment(assign) => self.lower_assignment(b, cx, assign, stmt.span),

            StmtKind::If(if_stmt) => self.lower_if_chain(
                b,
                cx,
                &if_stmt.cond,
                &if_stmt.then_block,
                &if_stmt.else_ifs,
                if_stmt.else_block.as_ref(),
                stmt.span,
            ),

            StmtKind::Select(select) => self.lower_select(b, cx, select, stmt.span),

            StmtKind::While(w) => {
                let loop_id = b.next_loop_id();
                let cond_block = b.new_block("while.cond", BlockKind::LoopHeader { loop_id });
                let body_block = b.new_block("while.body", BlockKind::LoopBody { loop_id });
                let end_block = b.new_block("while.end", BlockKind::LoopEnd { loop_id });

                b.terminate(
                    InstKind::Branch { target: cond_block },
                    self.analysis.types.void(),
                    stmt.span,
                );

                b.set_current(cond_block);
                let cond = self.lower_expr(b, cx, &w.cond)?;
                b.terminate(
                    InstKind::CondBranch {
                        cond,
                        then_block: body_block,
                        else_block: end_block,
                    },
                    self.analysis.types.void(),
                    stmt.span,
                );

                b.set_current(body_block);
                b.push_loop(LoopCtx {
                    continue_target: cond_block,
                    break_target: end_block,
                    kind: LoopCtxKind::While,
                    loop_id,
                });
                self.lower_scoped_block(b, cx, &w.body)?;
                b.pop_loop();
                b.terminate(
                    InstKind::Branch { target: cond_block },
                    self.analysis.types.void(),
                    stmt.span,
                );

                b.set_current(end_block);
                Ok(())
            }

            StmtKind::DoLoop(d) => self.lower_do_loop(b, cx, d, stmt.span),

            StmtKind::For(for_stmt) => self.lower_for(b, cx, for_stmt, stmt.span),

            StmtKind::ForEach(fe) => self.lower_foreach(b, cx, fe, stmt.span),

            StmtKind::Try(t) => self.lower_try(b, cx, t, stmt.span),

            StmtKind::With(w) => {
                let subject = self.lower_expr(b, cx, &w.subject)?;
                // Complex subjects are stashed in a named local so member
                // accesses do not re-evaluate them.
                let subject = match subject {
                    Value::Ref(name) if !is_temp_name(name) => Value::Ref(name),
                    v => {
                        let name = Symbol::intern(&format!("__with{}", cx.with_counter));
                        cx.with_counter += 1;
                        let local = b.declare_local(name, self.ty(w.subject.id));
                        b.emit_effect(
                            InstKind::Assign {
                                target: local,
                                value: v,
                            },
                            self.ty(w.subject.id),
                            stmt.span,
                        );
                        Value::Ref(local)
                    }
                };
                cx.with_stack.push(subject);
                let result = self.lower_scoped_block(b, cx, &w.body);
                cx.with_stack.pop();
                result
            }

            StmtKind::Return(value) => {
                let value = match value {
                    Some(v) => Some(self.lower_expr(b, cx, v)?),
                    None => None,
                };
                b.terminate(
                    InstKind::Return { value },
                    self.analysis.types.void(),
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::Exit(kind) => self.lower_exit(b, *kind, stmt.span),

            StmtKind::Throw(value) => {
                let value = match value {
                    Some(v) => Some(self.lower_expr(b, cx, v)?),
                    None => None,
                };
                b.emit_effect(
                    InstKind::Throw { value },
                    self.analysis.types.void(),
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::RaiseEvent { event, args } => {
                let args = self.lower_args(b, cx, args)?;
                let object = self.lower_name(b, cx, *event, stmt.span);
                b.emit_value(
                    InstKind::MethodCall {
                        object,
                        method: Symbol::intern("Invoke"),
                        args,
                    },
                    self.analysis.types.void(),
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::AddHandler { event, handler } => {
                let event = self.lower_expr(b, cx, event)?;
                let handler = self.lower_expr(b, cx, handler)?;
                b.emit_effect(
                    InstKind::HandlerBind {
                        event,
                        handler,
                        add: true,
                    },
                    self.analysis.types.void(),
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::RemoveHandler { event, handler } => {
                let event = self.lower_expr(b, cx, event)?;
                let handler = self.lower_expr(b, cx, handler)?;
                b.emit_effect(
                    InstKind::HandlerBind {
                        event,
                        handler,
                        add: false,
                    },
                    self.analysis.types.void(),
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::Yield(value) => {
                let value = match value {
                    Some(v) => Some(self.lower_expr(b, cx, v)?),
                    None => None,
                };
                b.emit_effect(
                    InstKind::Yield { value },
                    self.analysis.types.void(),
                    stmt.span,
                );
                Ok(())
            }

            StmtKind::Expression(expr) => {
                // Statement-position increment/decrement becomes a plain
                // assignment so the emitter always has something to print.
                if let ExprKind::Unary {
                    op: op @ (ast::UnOp::Inc | ast::UnOp::Dec),
                    operand,
                    ..
                } = &expr.kind
                {
                    if let ExprKind::Identifier(name) = &operand.kind {
                        if let Some(versioned) = b.lookup_var(*name) {
                            let ty = self.ty(operand.id);
                            let delta = Value::Constant(ConstValue::Int(1));
                            let binop = if matches!(*op, ast::UnOp::Inc) {
                                BinaryOp::Add
                            } else {
                                BinaryOp::Sub
                            };
                            let result = b.emit_value(
                                InstKind::Binary {
                                    op: binop,
                                    lhs: Value::Ref(versioned),
                                    rhs: delta,
                                },
                                ty,
                                stmt.span,
                            );
                            b.emit_effect(
                                InstKind::Assign {
                                    target: versioned,
                                    value: result,
                                },
                                ty,
                                stmt.span,
                            );
                            return Ok(());
                        }
                    }
                }
                self.lower_expr(b, cx, expr)?;
                Ok(())
            }
        }
    }

    /// Lower a block's statements in a fresh lexical scope, stopping at a
    /// terminator.
    fn lower_scoped_block(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        block: &ast::Block,
    ) -> Result<(), LowerError> {
        b.push_scope();
        for stmt in &block.stmts {
            if b.is_terminated() {
                break;
            }
            self.lower_stmt(b, cx, stmt)?;
        }
        b.pop_scope();
        Ok(())
    }

    fn lower_assignment(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        assign: &ast::AssignStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let mut value = self.lower_expr(b, cx, &assign.value)?;

        // Compound operators read the target first.
        if assign.op != ast::AssignOp::Assign {
            let current = self.lower_expr(b, cx, &assign.target)?;
            let op = match assign.op {
                ast::AssignOp::AddAssign => BinaryOp::Add,
                ast::AssignOp::SubAssign => BinaryOp::Sub,
                ast::AssignOp::MulAssign => BinaryOp::Mul,
                ast::AssignOp::DivAssign => BinaryOp::Div,
                ast::AssignOp::Assign => unreachable!(),
            };
            value = b.emit_value(
                InstKind::Binary {
                    op,
                    lhs: current,
                    rhs: value,
                },
                self.ty(assign.target.id),
                span,
            );
        }

        match &assign.target.kind {
            ExprKind::Identifier(name) => {
                if let Some(versioned) = b.lookup_var(*name) {
                    b.emit_effect(
                        InstKind::Assign {
                            target: versioned,
                            value,
                        },
                        self.ty(assign.target.id),
                        span,
                    );
                    return Ok(());
                }
                // Field of the enclosing class, or a module global.
                if let Some(class) = cx.class.clone() {
                    if self.class_has_field(class.ty, *name) {
                        let object = self.this_or_class(b, class.name, class.ty, *name);
                        b.emit_effect(
                            InstKind::FieldStore {
                                object,
                                field: *name,
                                value,
                            },
                            self.analysis.types.void(),
                            span,
                        );
                        return Ok(());
                    }
                }
                b.emit_effect(
                    InstKind::Assign {
                        target: *name,
                        value,
                    },
                    self.ty(assign.target.id),
                    span,
                );
                Ok(())
            }

            ExprKind::MemberAccess { object, member } => {
                let object = self.lower_expr(b, cx, object)?;
                b.emit_effect(
                    InstKind::FieldStore {
                        object,
                        field: *member,
                        value,
                    },
                    self.analysis.types.void(),
                    span,
                );
                Ok(())
            }

            ExprKind::ArrayAccess { base, indices } => {
                let array = self.lower_expr(b, cx, base)?;
                let indices = self.lower_args(b, cx, indices)?;
                b.emit_effect(
                    InstKind::ArrayStore {
                        array,
                        indices,
                        value,
                    },
                    self.analysis.types.void(),
                    span,
                );
                Ok(())
            }

            ExprKind::WithSubject => Err(self.internal("assignment to a bare With subject", span)),

            _ => Err(self.internal("unsupported assignment target", span)),
        }
    }

    fn lower_if_chain(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        cond: &ast::Expr,
        then_block: &ast::Block,
        else_ifs: &[ast::ElseIf],
        else_block: Option<&ast::Block>,
        span: Span,
    ) -> Result<(), LowerError> {
        let cond_value = self.lower_expr(b, cx, cond)?;

        let has_else = !else_ifs.is_empty() || else_block.is_some();
        let then_bb = b.new_block("if.then", BlockKind::IfThen);
        let else_bb = if has_else {
            Some(b.new_block("if.else", BlockKind::IfElse))
        } else {
            None
        };
        let end_bb = b.new_block("if.end", BlockKind::Merge);

        b.terminate(
            InstKind::CondBranch {
                cond: cond_value,
                then_block: then_bb,
                else_block: else_bb.unwrap_or(end_bb),
            },
            self.analysis.types.void(),
            span,
        );

        b.set_current(then_bb);
        self.lower_scoped_block(b, cx, then_block)?;
        b.terminate(
            InstKind::Branch { target: end_bb },
            self.analysis.types.void(),
            span,
        );

        if let Some(else_bb) = else_bb {
            b.set_current(else_bb);
            match else_ifs.split_first() {
                // The else arm of this level holds the next link of the
                // chain; the ordered list keeps every branch.
                Some((first, rest)) => {
                    self.lower_if_chain(b, cx, &first.cond, &first.block, rest, else_block, span)?;
                }
                None => {
                    if let Some(else_block) = else_block {
                        self.lower_scoped_block(b, cx, else_block)?;
                    }
                }
            }
            b.terminate(
                InstKind::Branch { target: end_bb },
                self.analysis.types.void(),
                span,
            );
        }

        b.set_current(end_bb);
        Ok(())
    }

    fn lower_do_loop(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        d: &ast::DoLoopStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let loop_id = b.next_loop_id();
        let cond_block = b.new_block("do.cond", BlockKind::LoopHeader { loop_id });
        let body_block = b.new_block("do.body", BlockKind::LoopBody { loop_id });
        let end_block = b.new_block("do.end", BlockKind::LoopEnd { loop_id });
        let void = self.analysis.types.void();

        // Pre-test loops enter through the condition; post-test loops run
        // the body once before the first evaluation.
        let entry_target = match d.test {
            ast::DoTest::Pre => cond_block,
            ast::DoTest::Post => body_block,
        };
        b.terminate(InstKind::Branch { target: entry_target }, void, span);

        b.set_current(cond_block);
        let cond = self.lower_expr(b, cx, &d.cond)?;
        // Until-style loops swap the branch sides: the end block sits on the
        // true edge.
        let (then_block, else_block) = match d.cond_kind {
            ast::DoCondKind::While => (body_block, end_block),
            ast::DoCondKind::Until => (end_block, body_block),
        };
        b.terminate(
            InstKind::CondBranch {
                cond,
                then_block,
                else_block,
            },
            void,
            span,
        );

        b.set_current(body_block);
        b.push_loop(LoopCtx {
            continue_target: cond_block,
            break_target: end_block,
            kind: LoopCtxKind::Do,
            loop_id,
        });
        self.lower_scoped_block(b, cx, &d.body)?;
        b.pop_loop();
        b.terminate(InstKind::Branch { target: cond_block }, void, span);

        b.set_current(end_block);
        Ok(())
    }

    fn lower_for(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        for_stmt: &ast::ForStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let void = self.analysis.types.void();
        let start = self.lower_expr(b, cx, &for_stmt.start)?;
        let end = self.lower_expr(b, cx, &for_stmt.end)?;
        let step = match &for_stmt.step {
            Some(step) => Some(self.lower_expr(b, cx, step)?),
            None => None,
        };

        b.push_scope();
        let var_ty = self
            .analysis
            .types
            .common_numeric_type(self.ty(for_stmt.start.id), self.ty(for_stmt.end.id))
            .unwrap_or_else(|| self.analysis.types.integer());
        let var = b.declare_local(for_stmt.var, var_ty);

        // Init lands in the current block, before the loop blocks exist.
        b.emit_effect(
            InstKind::Assign {
                target: var,
                value: start,
            },
            var_ty,
            span,
        );

        let loop_id = b.next_loop_id();
        let cond_block = b.new_block("for.cond", BlockKind::LoopHeader { loop_id });
        let body_block = b.new_block("for.body", BlockKind::LoopBody { loop_id });
        let inc_block = b.new_block("for.inc", BlockKind::LoopInc { loop_id });
        let end_block = b.new_block("for.end", BlockKind::LoopEnd { loop_id });

        b.terminate(InstKind::Branch { target: cond_block }, void, span);

        // A constant negative step counts down.
        let descending = matches!(
            step,
            Some(Value::Constant(ConstValue::Int(v))) if v < 0
        ) || matches!(
            step,
            Some(Value::Constant(ConstValue::Float(v))) if v < 0.0
        );

        b.set_current(cond_block);
        let cmp = b.emit_value(
            InstKind::Compare {
                op: if descending { CompareOp::Ge } else { CompareOp::Le },
                lhs: Value::Ref(var),
                rhs: end,
            },
            self.analysis.types.boolean(),
            span,
        );
        b.terminate(
            InstKind::CondBranch {
                cond: cmp,
                then_block: body_block,
                else_block: end_block,
            },
            void,
            span,
        );

        b.set_current(body_block);
        b.push_loop(LoopCtx {
            continue_target: inc_block,
            break_target: end_block,
            kind: LoopCtxKind::For,
            loop_id,
        });
        self.lower_scoped_block(b, cx, &for_stmt.body)?;
        b.pop_loop();
        b.terminate(InstKind::Branch { target: inc_block }, void, span);

        b.set_current(inc_block);
        let stepped = b.emit_value(
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Value::Ref(var),
                rhs: step.unwrap_or(Value::Constant(ConstValue::Int(1))),
            },
            var_ty,
            span,
        );
        b.emit_effect(
            InstKind::Assign {
                target: var,
                value: stepped,
            },
            var_ty,
            span,
        );
        b.terminate(InstKind::Branch { target: cond_block }, void, span);

        b.pop_scope();
        b.set_current(end_block);
        Ok(())
    }

    fn lower_foreach(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        fe: &ast::ForEachStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let void = self.analysis.types.void();
        let integer = self.analysis.types.integer();

        let collection = self.lower_expr(b, cx, &fe.collection)?;
        let coll_ty = self.ty(fe.collection.id);
        let elem_ty = match self
            .analysis
            .types
            .kind_of(self.analysis.types.resolve_alias(coll_ty))
        {
            TypeKind::Array { elem, .. } => *elem,
            _ => self.analysis.types.object(),
        };

        b.push_scope();
        let loop_id = b.next_loop_id();

        // Index local driving the iteration.
        let index = b.declare_local(Symbol::intern(&format!("__i{}", loop_id)), integer);
        b.emit_effect(
            InstKind::Assign {
                target: index,
                value: Value::Constant(ConstValue::Int(0)),
            },
            integer,
            span,
        );

        let cond_block = b.new_block("foreach.cond", BlockKind::LoopHeader { loop_id });
        let body_block = b.new_block("foreach.body", BlockKind::LoopBody { loop_id });
        let inc_block = b.new_block("foreach.inc", BlockKind::LoopInc { loop_id });
        let end_block = b.new_block("foreach.end", BlockKind::LoopEnd { loop_id });

        b.terminate(InstKind::Branch { target: cond_block }, void, span);

        b.set_current(cond_block);
        let length = b.emit_value(
            InstKind::FieldAccess {
                object: collection.clone(),
                field: Symbol::intern("Length"),
            },
            integer,
            span,
        );
        let cmp = b.emit_value(
            InstKind::Compare {
                op: CompareOp::Lt,
                lhs: Value::Ref(index),
                rhs: length,
            },
            self.analysis.types.boolean(),
            span,
        );
        b.terminate(
            InstKind::CondBranch {
                cond: cmp,
                then_block: body_block,
                else_block: end_block,
            },
            void,
            span,
        );

        b.set_current(body_block);
        let var = b.declare_local(fe.var, elem_ty);
        let addr = b.emit_value(
            InstKind::GetElementPtr {
                base: collection.clone(),
                indices: vec![Value::Ref(index)],
            },
            elem_ty,
            span,
        );
        let element = b.emit_value(InstKind::Load { addr }, elem_ty, span);
        b.emit_effect(
            InstKind::Assign {
                target: var,
                value: element,
            },
            elem_ty,
            span,
        );

        b.push_loop(LoopCtx {
            continue_target: inc_block,
            break_target: end_block,
            kind: LoopCtxKind::For,
            loop_id,
        });
        self.lower_scoped_block(b, cx, &fe.body)?;
        b.pop_loop();
        b.terminate(InstKind::Branch { target: inc_block }, void, span);

        b.set_current(inc_block);
        let next = b.emit_value(
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Value::Ref(index),
                rhs: Value::Constant(ConstValue::Int(1)),
            },
            integer,
            span,
        );
        b.emit_effect(
            InstKind::Assign {
                target: index,
                value: next,
            },
            integer,
            span,
        );
        b.terminate(InstKind::Branch { target: cond_block }, void, span);

        b.pop_scope();
        b.set_current(end_block);
        Ok(())
    }

    fn lower_select(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        select: &ast::SelectStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        // A Select whose arms are all constant, guard-free patterns becomes
        // a Switch; anything else lowers to an if/else chain.
        let all_const = select.cases.iter().all(|case| {
            case.patterns.iter().all(|p| {
                p.guard.is_none()
                    && matches!(&p.kind, CasePatternKind::Constant(e) if self.const_eval(e).is_some())
            })
        });

        if all_const {
            return self.lower_switch(b, cx, select, span);
        }
        self.lower_pattern_select(b, cx, select, span)
    }

    fn lower_switch(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        select: &ast::SelectStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let void = self.analysis.types.void();
        let value = self.lower_expr(b, cx, &select.scrutinee)?;

        let mut arms = Vec::new();
        let mut case_blocks = Vec::new();
        for (i, case) in select.cases.iter().enumerate() {
            let block = b.new_block(&format!("switch_case_{}", i), BlockKind::SwitchCase);
            let values: Vec<ConstValue> = case
                .patterns
                .iter()
                .filter_map(|p| match &p.kind {
                    CasePatternKind::Constant(e) => self.const_eval(e),
                    _ => None,
                })
                .collect();
            arms.push(SwitchArm {
                values,
                target: block,
            });
            case_blocks.push(block);
        }

        let default_block = select
            .default
            .as_ref()
            .map(|_| b.new_block("switch.default", BlockKind::SwitchDefault));
        let end_block = b.new_block("switch.end", BlockKind::SwitchEnd);

        b.terminate(
            InstKind::Switch {
                value,
                arms,
                default: default_block.unwrap_or(end_block),
            },
            void,
            span,
        );

        for (case, block) in select.cases.iter().zip(case_blocks) {
            b.set_current(block);
            self.lower_scoped_block(b, cx, &case.body)?;
            b.terminate(InstKind::Branch { target: end_block }, void, span);
        }

        if let (Some(default), Some(block)) = (&select.default, default_block) {
            b.set_current(block);
            self.lower_scoped_block(b, cx, default)?;
            b.terminate(InstKind::Branch { target: end_block }, void, span);
        }

        b.set_current(end_block);
        Ok(())
    }

    /// Pattern-bearing Select arms (type tests, ranges, comparisons,
    /// guards) lower to an if/else chain over the materialized scrutinee.
    fn lower_pattern_select(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        select: &ast::SelectStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let void = self.analysis.types.void();
        let boolean = self.analysis.types.boolean();
        let scrutinee_ty = self.ty(select.scrutinee.id);

        let scrutinee = {
            let value = self.lower_expr(b, cx, &select.scrutinee)?;
            match value {
                Value::Ref(name) if !is_temp_name(name) => Value::Ref(name),
                v @ Value::Constant(_) => v,
                v => {
                    // A temp scrutinee would be re-evaluated at every arm;
                    // bind it to a declared local instead.
                    let n = b.function.next_temp;
                    b.function.next_temp += 1;
                    let name =
                        b.declare_local(Symbol::intern(&format!("__sel{}", n)), scrutinee_ty);
                    b.emit_effect(
                        InstKind::Assign {
                            target: name,
                            value: v,
                        },
                        scrutinee_ty,
                        span,
                    );
                    Value::Ref(name)
                }
            }
        };

        let end_block = b.new_block("switch.end", BlockKind::Merge);

        for case in &select.cases {
            b.push_scope();

            let mut cond: Option<Value> = None;
            for pattern in &case.patterns {
                let test = match &pattern.kind {
                    CasePatternKind::Constant(e) => {
                        let label = self.lower_expr(b, cx, e)?;
                        b.emit_value(
                            InstKind::Compare {
                                op: CompareOp::Eq,
                                lhs: scrutinee.clone(),
                                rhs: label,
                            },
                            boolean,
                            span,
                        )
                    }
                    CasePatternKind::Range { lo, hi } => {
                        let lo = self.lower_expr(b, cx, lo)?;
                        let hi = self.lower_expr(b, cx, hi)?;
                        let ge = b.emit_value(
                            InstKind::Compare {
                                op: CompareOp::Ge,
                                lhs: scrutinee.clone(),
                                rhs: lo,
                            },
                            boolean,
                            span,
                        );
                        let le = b.emit_value(
                            InstKind::Compare {
                                op: CompareOp::Le,
                                lhs: scrutinee.clone(),
                                rhs: hi,
                            },
                            boolean,
                            span,
                        );
                        b.emit_value(
                            InstKind::Binary {
                                op: BinaryOp::And,
                                lhs: ge,
                                rhs: le,
                            },
                            boolean,
                            span,
                        )
                    }
                    CasePatternKind::Comparison { op, rhs } => {
                        let rhs = self.lower_expr(b, cx, rhs)?;
                        b.emit_value(
                            InstKind::Compare {
                                op: lower_compare_op(*op),
                                lhs: scrutinee.clone(),
                                rhs,
                            },
                            boolean,
                            span,
                        )
                    }
                    CasePatternKind::Type { binding, .. } => {
                        // A type pattern casts into its binding (when one is
                        // declared) and tests the result against null.
                        let target_ty = self
                            .analysis
                            .type_of(pattern.id)
                            .unwrap_or_else(|| self.analysis.types.object());
                        let name = match binding {
                            Some(name) => b.declare_local(*name, target_ty),
                            None => b.fresh_temp(),
                        };
                        let casted = b.emit_named(
                            InstKind::Cast {
                                kind: basc_sem::CastKind::Bitcast,
                                value: scrutinee.clone(),
                                target: target_ty,
                            },
                            name,
                            target_ty,
                            span,
                        );
                        b.emit_value(
                            InstKind::Compare {
                                op: CompareOp::Ne,
                                lhs: casted,
                                rhs: Value::Constant(ConstValue::Null),
                            },
                            boolean,
                            span,
                        )
                    }
                };

                let test = match &pattern.guard {
                    Some(guard) => {
                        let guard = self.lower_expr(b, cx, guard)?;
                        b.emit_value(
                            InstKind::Binary {
                                op: BinaryOp::And,
                                lhs: test,
                                rhs: guard,
                            },
                            boolean,
                            span,
                        )
                    }
                    None => test,
                };

                cond = Some(match cond {
                    Some(prev) => b.emit_value(
                        InstKind::Binary {
                            op: BinaryOp::Or,
                            lhs: prev,
                            rhs: test,
                        },
                        boolean,
                        span,
                    ),
                    None => test,
                });
            }

            let cond = cond
                .ok_or_else(|| self.internal("Select case with no patterns", span))?;
            let body_block = b.new_block("if.then", BlockKind::IfThen);
            let next_block = b.new_block("if.else", BlockKind::IfElse);
            b.terminate(
                InstKind::CondBranch {
                    cond,
                    then_block: body_block,
                    else_block: next_block,
                },
                void,
                span,
            );

            b.set_current(body_block);
            for stmt in &case.body.stmts {
                if b.is_terminated() {
                    break;
                }
                self.lower_stmt(b, cx, stmt)?;
            }
            b.terminate(InstKind::Branch { target: end_block }, void, span);
            b.pop_scope();

            b.set_current(next_block);
        }

        if let Some(default) = &select.default {
            self.lower_scoped_block(b, cx, default)?;
        }
        b.terminate(InstKind::Branch { target: end_block }, void, span);

        b.set_current(end_block);
        Ok(())
    }

    fn lower_try(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        t: &ast::TryStmt,
        span: Span,
    ) -> Result<(), LowerError> {
        let void = self.analysis.types.void();
        let body_block = b.new_block("try.body", BlockKind::TryBody);
        let end_block = b.new_block("try.end", BlockKind::Merge);

        b.terminate(InstKind::Branch { target: body_block }, void, span);

        b.set_current(body_block);
        self.lower_scoped_block(b, cx, &t.body)?;
        b.terminate(InstKind::Branch { target: end_block }, void, span);

        let mut catches = Vec::new();
        for clause in &t.catches {
            let block = b.new_block("catch.body", BlockKind::CatchBody);
            b.set_current(block);
            b.push_scope();
            let caught_ty = clause
                .ty
                .as_ref()
                .and_then(|re| self.analysis.types.lookup(re.name));
            let var = clause.var.map(|name| {
                b.declare_local(name, caught_ty.unwrap_or_else(|| self.analysis.types.object()))
            });
            for stmt in &clause.body.stmts {
                if b.is_terminated() {
                    break;
                }
                self.lower_stmt(b, cx, stmt)?;
            }
            b.pop_scope();
            b.terminate(InstKind::Branch { target: end_block }, void, span);
            catches.push(CatchMeta {
                var,
                ty: caught_ty,
                block,
            });
        }

        let finally = match &t.finally {
            Some(finally_block) => {
                let block = b.new_block("finally.body", BlockKind::FinallyBody);
                b.set_current(block);
                self.lower_scoped_block(b, cx, finally_block)?;
                b.terminate(InstKind::Branch { target: end_block }, void, span);
                Some(block)
            }
            None => None,
        };

        b.function.try_regions.push(TryRegion {
            body: body_block,
            catches,
            finally,
            end: end_block,
        });

        b.set_current(end_block);
        Ok(())
    }

    fn lower_exit(
        &mut self,
        b: &mut FunctionBuilder,
        kind: ast::ExitKind,
        span: Span,
    ) -> Result<(), LowerError> {
        let void = self.analysis.types.void();
        match kind {
            ast::ExitKind::For | ast::ExitKind::Do | ast::ExitKind::While => {
                let loop_kind = match kind {
                    ast::ExitKind::For => LoopCtxKind::For,
                    ast::ExitKind::Do => LoopCtxKind::Do,
                    _ => LoopCtxKind::While,
                };
                let target = b
                    .innermost_loop(loop_kind)
                    .map(|ctx| ctx.break_target)
                    .ok_or_else(|| self.internal("Exit outside matching loop", span))?;
                b.terminate(InstKind::Branch { target }, void, span);
            }
            ast::ExitKind::Sub => {
                b.terminate(InstKind::Return { value: None }, void, span);
            }
            ast::ExitKind::Function => {
                let ret = b.function.return_type;
                let value = if self.analysis.types.is_void(ret) {
                    None
                } else {
                    Some(Value::Constant(self.default_value(ret)))
                };
                b.terminate(InstKind::Return { value }, void, span);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn lower_args(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        args: &[ast::Expr],
    ) -> Result<Vec<Value>, LowerError> {
        args.iter().map(|a| self.lower_expr(b, cx, a)).collect()
    }

    /// Resolve a bare name to a value: current version of a local or
    /// parameter, a field of the enclosing class, or the name itself
    /// (globals, function references, externs).
    fn lower_name(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &Cx,
        name: Symbol,
        span: Span,
    ) -> Value {
        if let Some(versioned) = b.lookup_var(name) {
            return Value::Ref(versioned);
        }
        if let Some(class) = cx.class.clone() {
            if self.class_has_field(class.ty, name) {
                let object = self.this_or_class(b, class.name, class.ty, name);
                return b.emit_value(
                    InstKind::FieldAccess {
                        object,
                        field: name,
                    },
                    self.field_type(class.ty, name),
                    span,
                );
            }
        }
        Value::Ref(name)
    }

    fn lower_expr(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        expr: &ast::Expr,
    ) -> Result<Value, LowerError> {
        let ty = self.ty(expr.id);
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Value::Constant(match lit {
                ast::Literal::Integer(v) => ConstValue::Int(*v),
                ast::Literal::Float(v) => ConstValue::Float(*v),
                ast::Literal::Str(v) => ConstValue::Str(v.clone()),
                ast::Literal::Bool(v) => ConstValue::Bool(*v),
                ast::Literal::Char(v) => ConstValue::Char(*v),
                ast::Literal::Null => ConstValue::Null,
            })),

            ExprKind::Identifier(name) => {
                // Constants inline their value.
                if let Some(value) = self.const_value(expr) {
                    return Ok(value);
                }
                Ok(self.lower_name(b, cx, *name, expr.span))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(b, cx, lhs)?;
                let rhs = self.lower_expr(b, cx, rhs)?;
                let kind = match lower_binary_op(*op) {
                    LoweredBinary::Arith(bin) => InstKind::Binary {
                        op: bin,
                        lhs,
                        rhs,
                    },
                    LoweredBinary::Cmp(cmp) => InstKind::Compare { op: cmp, lhs, rhs },
                };
                Ok(b.emit_value(kind, ty, expr.span))
            }

            ExprKind::Unary { op, operand, .. } => {
                let operand = self.lower_expr(b, cx, operand)?;
                let op = match op {
                    ast::UnOp::Neg => UnaryOp::Neg,
                    ast::UnOp::Not => UnaryOp::Not,
                    ast::UnOp::BitwiseNot => UnaryOp::BitwiseNot,
                    ast::UnOp::Inc => UnaryOp::Inc,
                    ast::UnOp::Dec => UnaryOp::Dec,
                };
                Ok(b.emit_value(InstKind::Unary { op, operand }, ty, expr.span))
            }

            ExprKind::InterpolatedString(parts) => self.lower_interpolation(b, cx, parts, expr),

            ExprKind::MemberAccess { object, member } => {
                // Enum member: keep the symbolic form.
                if let ExprKind::Identifier(type_name) = &object.kind {
                    if let Some(enum_ty) = self.analysis.types.lookup(*type_name) {
                        if matches!(self.analysis.types.kind_of(enum_ty), TypeKind::Enum { .. }) {
                            return Ok(b.emit_value(
                                InstKind::FieldAccess {
                                    object: Value::Ref(*type_name),
                                    field: *member,
                                },
                                enum_ty,
                                expr.span,
                            ));
                        }
                    }
                }
                let object = self.lower_expr(b, cx, object)?;
                Ok(b.emit_value(
                    InstKind::FieldAccess {
                        object,
                        field: *member,
                    },
                    ty,
                    expr.span,
                ))
            }

            ExprKind::Call {
                callee,
                args,
                generic_args: _,
            } => self.lower_call(b, cx, expr, callee, args),

            ExprKind::ArrayAccess { base, indices } => {
                let base = self.lower_expr(b, cx, base)?;
                let indices = self.lower_args(b, cx, indices)?;
                let addr = b.emit_value(
                    InstKind::GetElementPtr { base, indices },
                    ty,
                    expr.span,
                );
                Ok(b.emit_value(InstKind::Load { addr }, ty, expr.span))
            }

            ExprKind::New { ty: type_ref, args } => {
                let args = self.lower_args(b, cx, args)?;
                if type_ref.is_array {
                    let elem = self
                        .analysis
                        .types
                        .lookup(type_ref.name)
                        .unwrap_or_else(|| self.analysis.types.object());
                    Ok(b.emit_value(
                        InstKind::ArrayAlloc { elem, dims: args },
                        ty,
                        expr.span,
                    ))
                } else {
                    Ok(b.emit_value(
                        InstKind::NewObject { class: ty, args },
                        ty,
                        expr.span,
                    ))
                }
            }

            ExprKind::Cast { ty: _, expr: inner } => {
                let source_ty = self.ty(inner.id);
                let value = self.lower_expr(b, cx, inner)?;
                let kind = self.analysis.types.cast_kind_for(source_ty, ty);
                Ok(b.emit_value(
                    InstKind::Cast {
                        kind,
                        value,
                        target: ty,
                    },
                    ty,
                    expr.span,
                ))
            }

            ExprKind::MyBase => Ok(Value::Ref(Symbol::intern("base"))),

            ExprKind::WithSubject => cx
                .with_stack
                .last()
                .cloned()
                .ok_or_else(|| self.internal("With subject outside With", expr.span)),

            ExprKind::Lambda(lambda) => {
                let name = self.lower_lambda(lambda, ty)?;
                Ok(Value::Ref(name))
            }

            ExprKind::Await(inner) => {
                let value = self.lower_expr(b, cx, inner)?;
                Ok(b.emit_value(InstKind::Await { value }, ty, expr.span))
            }

            ExprKind::CollectionInit { elements } => {
                let elem_ty = match self
                    .analysis
                    .types
                    .kind_of(self.analysis.types.resolve_alias(ty))
                {
                    TypeKind::Array { elem, .. } => *elem,
                    _ => self.analysis.types.object(),
                };
                let array = b.emit_value(
                    InstKind::ArrayAlloc {
                        elem: elem_ty,
                        dims: vec![Value::Constant(ConstValue::Int(elements.len() as i64))],
                    },
                    ty,
                    expr.span,
                );
                for (i, element) in elements.iter().enumerate() {
                    let value = self.lower_expr(b, cx, element)?;
                    b.emit_effect(
                        InstKind::ArrayStore {
                            array: array.clone(),
                            indices: vec![Value::Constant(ConstValue::Int(i as i64))],
                            value,
                        },
                        self.analysis.types.void(),
                        expr.span,
                    );
                }
                Ok(array)
            }

            ExprKind::TupleLiteral { elements } => {
                let args = elements
                    .iter()
                    .map(|(_, e)| self.lower_expr(b, cx, e))
                    .collect::<Result<Vec<_>, _>>()?;
                // Rendered as a target tuple literal by the emitter.
                Ok(b.emit_value(
                    InstKind::Call {
                        callee: Symbol::intern("__tuple"),
                        args,
                    },
                    ty,
                    expr.span,
                ))
            }
        }
    }

    fn lower_interpolation(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        parts: &[ast::InterpPart],
        expr: &ast::Expr,
    ) -> Result<Value, LowerError> {
        let string_ty = self.analysis.types.string();
        let mut acc: Option<Value> = None;

        for part in parts {
            let piece = match part {
                ast::InterpPart::Text(text) => Value::Constant(ConstValue::Str(text.clone())),
                ast::InterpPart::Expr(e) => {
                    let value = self.lower_expr(b, cx, e)?;
                    if self.analysis.types.is_string(self.ty(e.id)) {
                        value
                    } else {
                        // Non-string holes are stringified explicitly.
                        b.emit_value(
                            InstKind::MethodCall {
                                object: value,
                                method: Symbol::intern("ToString"),
                                args: Vec::new(),
                            },
                            string_ty,
                            e.span,
                        )
                    }
                }
            };
            acc = Some(match acc {
                // The chain is left-associative.
                Some(prev) => b.emit_value(
                    InstKind::Binary {
                        op: BinaryOp::Concat,
                        lhs: prev,
                        rhs: piece,
                    },
                    string_ty,
                    expr.span,
                ),
                None => piece,
            });
        }

        Ok(acc.unwrap_or(Value::Constant(ConstValue::Str(String::new()))))
    }

    fn lower_call(
        &mut self,
        b: &mut FunctionBuilder,
        cx: &mut Cx,
        expr: &ast::Expr,
        callee: &ast::Expr,
        args: &[ast::Expr],
    ) -> Result<Value, LowerError> {
        let ty = self.ty(expr.id);
        let args = self.lower_args(b, cx, args)?;

        match &callee.kind {
            ExprKind::Identifier(name) => {
                // Locals holding delegates are invoked through their current
                // version.
                if let Some(versioned) = b.lookup_var(*name) {
                    return Ok(b.emit_value(
                        InstKind::Call {
                            callee: versioned,
                            args,
                        },
                        ty,
                        expr.span,
                    ));
                }

                // Unqualified method calls inside a class dispatch through
                // the receiver or the class depending on staticness.
                if let Some(class) = cx.class.clone() {
                    if let Some(is_static) = self.class_method_staticness(class.ty, *name) {
                        let kind = if is_static {
                            InstKind::Call {
                                callee: Symbol::intern(&format!("{}.{}", class.name, name)),
                                args,
                            }
                        } else {
                            InstKind::MethodCall {
                                object: Value::Ref(Symbol::intern("this")),
                                method: *name,
                                args,
                            }
                        };
                        return Ok(b.emit_value(kind, ty, expr.span));
                    }
                }

                Ok(b.emit_value(
                    InstKind::Call {
                        callee: *name,
                        args,
                    },
                    ty,
                    expr.span,
                ))
            }

            ExprKind::MemberAccess { object, member } => {
                // MyBase.M(...) is a base-method call.
                if matches!(object.kind, ExprKind::MyBase) {
                    return Ok(b.emit_value(
                        InstKind::BaseCall {
                            method: *member,
                            args,
                        },
                        ty,
                        expr.span,
                    ));
                }

                // ClassName.M(...) is a static call when the name denotes a
                // known class and no local shadows it.
                if let ExprKind::Identifier(type_name) = &object.kind {
                    let shadowed = b.lookup_var(*type_name).is_some();
                    if !shadowed {
                        if let Some(class_ty) = self.analysis.types.lookup(*type_name) {
                            if matches!(
                                self.analysis.types.kind_of(class_ty),
                                TypeKind::Class { .. }
                            ) {
                                return Ok(b.emit_value(
                                    InstKind::Call {
                                        callee: Symbol::intern(&format!(
                                            "{}.{}",
                                            type_name, member
                                        )),
                                        args,
                                    },
                                    ty,
                                    expr.span,
                                ));
                            }
                        }
                    }
                }

                let object = self.lower_expr(b, cx, object)?;
                Ok(b.emit_value(
                    InstKind::MethodCall {
                        object,
                        method: *member,
                        args,
                    },
                    ty,
                    expr.span,
                ))
            }

            _ => {
                // Calling through an arbitrary expression: materialize the
                // callee and invoke it.
                let callee_value = self.lower_expr(b, cx, callee)?;
                Ok(b.emit_value(
                    InstKind::MethodCall {
                        object: callee_value,
                        method: Symbol::intern("Invoke"),
                        args,
                    },
                    ty,
                    expr.span,
                ))
            }
        }
    }

    /// Lower a lambda to an anonymous module function, saving and restoring
    /// the surrounding builder context by construction (the lambda gets its
    /// own builder).
    fn lower_lambda(
        &mut self,
        lambda: &ast::LambdaExpr,
        delegate_ty: TypeId,
    ) -> Result<Symbol, LowerError> {
        let name = Symbol::intern(&format!("__lambda_{}", self.lambda_counter));
        self.lambda_counter += 1;

        let (param_tys, ret) = match self.analysis.types.kind_of(delegate_ty) {
            TypeKind::Delegate { params, ret } => (params.clone(), *ret),
            _ => (Vec::new(), self.analysis.types.void()),
        };

        let mut b = FunctionBuilder::new(name, ret);
        for (param, ty) in lambda.params.iter().zip(
            param_tys
                .iter()
                .copied()
                .chain(std::iter::repeat(self.analysis.types.object())),
        ) {
            b.add_param(param.name, ty);
        }

        let mut cx = Cx::free();
        match &lambda.body {
            ast::LambdaBody::Expr(body) => {
                let value = self.lower_expr(&mut b, &mut cx, body)?;
                let value = if lambda.is_sub { None } else { Some(value) };
                b.terminate(
                    InstKind::Return { value },
                    self.analysis.types.void(),
                    body.span,
                );
            }
            ast::LambdaBody::Block(block) => {
                for stmt in &block.stmts {
                    if b.is_terminated() {
                        break;
                    }
                    self.lower_stmt(&mut b, &mut cx, stmt)?;
                }
            }
        }

        let func = self.finish_function(b, ret)?;
        self.pending.push(func);
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Class context helpers
    // ------------------------------------------------------------------

    fn class_has_field(&self, class_ty: TypeId, name: Symbol) -> bool {
        match self.analysis.types.kind_of(class_ty) {
            TypeKind::Class { members, .. } => members
                .get(&name)
                .map(|sym| {
                    let info = self.analysis.symbols.get(*sym);
                    matches!(
                        info.kind,
                        SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Event
                    )
                })
                .unwrap_or(false),
            _ => false,
        }
    }

    fn field_type(&self, class_ty: TypeId, name: Symbol) -> TypeId {
        match self.analysis.types.kind_of(class_ty) {
            TypeKind::Class { members, .. } => members
                .get(&name)
                .map(|sym| self.analysis.symbols.get(*sym).ty)
                .unwrap_or_else(|| self.analysis.types.object()),
            _ => self.analysis.types.object(),
        }
    }

    /// Receiver for a field of the enclosing class: `this` for instance
    /// fields, the class name for statics.
    fn this_or_class(
        &self,
        _b: &FunctionBuilder,
        class_name: Symbol,
        class_ty: TypeId,
        field: Symbol,
    ) -> Value {
        let is_static = match self.analysis.types.kind_of(class_ty) {
            TypeKind::Class { members, .. } => members
                .get(&field)
                .map(|sym| self.analysis.symbols.get(*sym).flags.is_static)
                .unwrap_or(false),
            _ => false,
        };
        if is_static {
            Value::Ref(class_name)
        } else {
            Value::Ref(Symbol::intern("this"))
        }
    }

    /// Whether the class has a callable member of this name, and if so
    /// whether it is static.
    fn class_method_staticness(&self, class_ty: TypeId, name: Symbol) -> Option<bool> {
        let mut current = class_ty;
        loop {
            match self.analysis.types.kind_of(current) {
                TypeKind::Class { members, base, .. } => {
                    if let Some(sym) = members.get(&name) {
                        let info = self.analysis.symbols.get(*sym);
                        if info.is_callable() {
                            return Some(info.flags.is_static);
                        }
                        return None;
                    }
                    match base {
                        Some(parent) => current = *parent,
                        None => return None,
                    }
                }
                _ => return None,
            }
        }
    }
}

/// AST binary operator to IR form: arithmetic/logic or comparison.
enum LoweredBinary {
    Arith(BinaryOp),
    Cmp(CompareOp),
}

fn lower_binary_op(op: ast::BinOp) -> LoweredBinary {
    match op {
        ast::BinOp::Add => LoweredBinary::Arith(BinaryOp::Add),
        ast::BinOp::Sub => LoweredBinary::Arith(BinaryOp::Sub),
        ast::BinOp::Mul => LoweredBinary::Arith(BinaryOp::Mul),
        ast::BinOp::Div => LoweredBinary::Arith(BinaryOp::Div),
        ast::BinOp::Mod => LoweredBinary::Arith(BinaryOp::Mod),
        ast::BinOp::IntDiv => LoweredBinary::Arith(BinaryOp::IntDiv),
        ast::BinOp::And => LoweredBinary::Arith(BinaryOp::And),
        ast::BinOp::Or => LoweredBinary::Arith(BinaryOp::Or),
        ast::BinOp::Xor => LoweredBinary::Arith(BinaryOp::Xor),
        ast::BinOp::Shl => LoweredBinary::Arith(BinaryOp::Shl),
        ast::BinOp::Shr => LoweredBinary::Arith(BinaryOp::Shr),
        ast::BinOp::Concat => LoweredBinary::Arith(BinaryOp::Concat),
        ast::BinOp::Eq => LoweredBinary::Cmp(CompareOp::Eq),
        ast::BinOp::Ne => LoweredBinary::Cmp(CompareOp::Ne),
        ast::BinOp::Lt => LoweredBinary::Cmp(CompareOp::Lt),
        ast::BinOp::Le => LoweredBinary::Cmp(CompareOp::Le),
        ast::BinOp::Gt => LoweredBinary::Cmp(CompareOp::Gt),
        ast::BinOp::Ge => LoweredBinary::Cmp(CompareOp::Ge),
    }
}

fn lower_compare_op(op: ast::BinOp) -> CompareOp {
    match op {
        ast::BinOp::Eq => CompareOp::Eq,
        ast::BinOp::Ne => CompareOp::Ne,
        ast::BinOp::Lt => CompareOp::Lt,
        ast::BinOp::Le => CompareOp::Le,
        ast::BinOp::Gt => CompareOp::Gt,
        ast::BinOp::Ge => CompareOp::Ge,
        _ => CompareOp::Eq,
    }
}

/// Map an operator symbol to a method name for the emitted class.
fn operator_method_name(symbol: Symbol) -> String {
    let name = match symbol.as_str() {
        "+" => "op_Addition",
        "-" => "op_Subtraction",
        "*" => "op_Multiply",
        "/" => "op_Division",
        "=" => "op_Equality",
        "<>" => "op_Inequality",
        "<" => "op_LessThan",
        "<=" => "op_LessThanOrEqual",
        ">" => "op_GreaterThan",
        ">=" => "op_GreaterThanOrEqual",
        other => return format!("op_{}", other),
    };
    name.to_string()
}

/// The temp-collapse rewrite: `t0 = a + b; x = t0` becomes `x = a + b`
/// whenever `t0` is a compiler temp with exactly one use.
///
/// Runs after initial lowering; [`LowerOptions::fold_assignments`] turns it
/// off for diagnostics. Use counting iterates blocks and instructions in
/// program order, so the rewrite is deterministic.
pub fn fold_definitions_into_assignments(func: &mut Function) -> usize {
    let mut use_counts: FxHashMap<Symbol, usize> = FxHashMap::default();
    for block in func.blocks.iter() {
        for inst in &block.insts {
            for operand in inst.operands() {
                if let Value::Ref(name) = operand {
                    *use_counts.entry(*name).or_insert(0) += 1;
                }
            }
        }
    }

    let mut folded = 0;
    for block in func.blocks.iter_mut() {
        let mut rewritten: Vec<Inst> = Vec::with_capacity(block.insts.len());
        for inst in block.insts.drain(..) {
            let fold = match (&inst.kind, rewritten.last()) {
                (InstKind::Assign { target, value }, Some(prev)) => match value {
                    Value::Ref(name)
                        if prev.result == Some(*name)
                            && is_temp_name(*name)
                            && use_counts.get(name).copied().unwrap_or(0) == 1 =>
                    {
                        Some(*target)
                    }
                    _ => None,
                },
                _ => None,
            };

            match fold {
                Some(target) => {
                    let prev = rewritten.last_mut().expect("fold requires a predecessor");
                    prev.result = Some(target);
                    folded += 1;
                }
                None => rewritten.push(inst),
            }
        }
        block.insts = rewritten;
    }
    folded
}

/// Compiler-minted temp names never collide with declared identifiers.
fn is_temp_name(name: Symbol) -> bool {
    name.starts_with("__t")
}
