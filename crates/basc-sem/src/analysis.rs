//! The semantic analyzer.
//!
//! A single forward pass over the program: declarations are processed in
//! source order, defining scopes and symbols as they appear and typing every
//! expression on the way. Errors accumulate in the handler so one run
//! surfaces as many problems as possible; the result is an [`Analysis`] with
//! the side tables every later stage reads.

use crate::scope::{ScopeKind, ScopeTree};
use crate::stdlib::StdLib;
use crate::symbols::{ParamInfo, SymbolArena, SymbolId, SymbolInfo, SymbolKind};
use crate::types::{ConstValue, TypeId, TypeKind, TypeTable};
use basc_ast as ast;
use basc_ast::{CasePatternKind, DeclKind, ExprKind, StmtKind};
use basc_util::diagnostic::codes;
use basc_util::{DiagnosticBuilder, DiagnosticCode, FxHashMap, Handler, NodeId, Span, Symbol};
use indexmap::IndexMap;
use thiserror::Error;

/// The product of semantic analysis.
pub struct Analysis {
    pub types: TypeTable,
    pub symbols: SymbolArena,
    pub scopes: ScopeTree,
    pub stdlib: StdLib,
    /// AST node to resolved type.
    pub node_types: FxHashMap<NodeId, TypeId>,
    /// AST node to resolved symbol.
    pub node_symbols: FxHashMap<NodeId, SymbolId>,
}

impl Analysis {
    /// Deterministic node-to-type lookup.
    pub fn type_of(&self, node: NodeId) -> Option<TypeId> {
        self.node_types.get(&node).copied()
    }

    /// Deterministic node-to-symbol lookup.
    pub fn symbol_of(&self, node: NodeId) -> Option<SymbolId> {
        self.node_symbols.get(&node).copied()
    }
}

/// Analysis completed with errors; diagnostics are in the handler.
#[derive(Debug, Error)]
#[error("semantic analysis failed with {errors} error(s)")]
pub struct AnalysisFailed {
    pub errors: usize,
}

/// The kind of loop a statement is nested in, for Exit checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopKind {
    For,
    Do,
    While,
}

/// Semantic analyzer state.
pub struct Analyzer<'a> {
    pub(crate) types: TypeTable,
    pub(crate) symbols: SymbolArena,
    pub(crate) scopes: ScopeTree,
    pub(crate) stdlib: StdLib,
    pub(crate) node_types: FxHashMap<NodeId, TypeId>,
    pub(crate) node_symbols: FxHashMap<NodeId, SymbolId>,
    pub(crate) handler: &'a Handler,

    /// The class type under analysis, for member and MyBase resolution.
    pub(crate) current_class: Option<TypeId>,
    /// Enclosing loop kinds, innermost last.
    pub(crate) loop_stack: Vec<LoopKind>,
    /// True inside an iterator callable.
    pub(crate) in_iterator: bool,
    /// Types of enclosing With subjects, innermost last.
    pub(crate) with_stack: Vec<TypeId>,
    /// Counter for anonymous lambda delegate types.
    pub(crate) lambda_counter: u32,
}

impl<'a> Analyzer<'a> {
    pub fn new(handler: &'a Handler) -> Self {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);
        Self {
            types,
            symbols: SymbolArena::new(),
            scopes: ScopeTree::new(),
            stdlib,
            node_types: FxHashMap::default(),
            node_symbols: FxHashMap::default(),
            handler,
            current_class: None,
            loop_stack: Vec::new(),
            in_iterator: false,
            with_stack: Vec::new(),
            lambda_counter: 0,
        }
    }

    /// Analyze a program; consumes the analyzer.
    pub fn analyze(mut self, program: &ast::Program) -> Result<Analysis, AnalysisFailed> {
        self.register_builtins();

        for decl in &program.decls {
            self.analyze_decl(decl);
        }

        if self.handler.has_errors() {
            return Err(AnalysisFailed {
                errors: self.handler.error_count(),
            });
        }

        Ok(Analysis {
            types: self.types,
            symbols: self.symbols,
            scopes: self.scopes,
            stdlib: self.stdlib,
            node_types: self.node_types,
            node_symbols: self.node_symbols,
        })
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub(crate) fn error(&self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        DiagnosticBuilder::error(message)
            .code(code)
            .span(span)
            .emit(self.handler);
    }

    pub(crate) fn warning(&self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        DiagnosticBuilder::warning(message)
            .code(code)
            .span(span)
            .emit(self.handler);
    }

    // ------------------------------------------------------------------
    // Built-in registration
    // ------------------------------------------------------------------

    /// Pre-register the standard-library signatures in the Global scope.
    fn register_builtins(&mut self) {
        let defs: Vec<_> = self
            .stdlib
            .iter()
            .map(|d| (d.name, d.params.clone(), d.ret))
            .collect();

        for (name, params, ret) in defs {
            let kind = if self.types.is_void(ret) {
                SymbolKind::Subroutine
            } else {
                SymbolKind::Function
            };
            let mut info = SymbolInfo::new(name, kind, self.types.void(), Span::DUMMY);
            info.return_type = Some(ret);
            info.params = params
                .iter()
                .map(|&ty| ParamInfo {
                    name: Symbol::intern("value"),
                    ty,
                    by_ref: false,
                })
                .collect();
            info.flags.is_builtin = true;
            let id = self.symbols.alloc(info);
            // Builtins precede everything; a later user definition of the
            // same name is a duplicate-definition error like any other.
            let _ = self.scopes.define(name, id);
        }
    }

    // ------------------------------------------------------------------
    // Type references
    // ------------------------------------------------------------------

    /// Resolve a surface type reference to an interned TypeId.
    pub(crate) fn resolve_type_ref(&mut self, re: &ast::TypeRef, span: Span) -> TypeId {
        let mut base = match self.types.lookup(re.name) {
            Some(id) => id,
            None => match self.scopes.resolve(re.name) {
                Some(sym) if self.symbols.get(sym).is_type_like() => self.symbols.get(sym).ty,
                _ => {
                    self.error(
                        codes::E_UNKNOWN_TYPE,
                        format!("unknown type `{}`", re.name),
                        span,
                    );
                    return self.types.error();
                }
            },
        };

        if !re.generic_args.is_empty() {
            let args: Vec<TypeId> = re
                .generic_args
                .iter()
                .map(|a| self.resolve_type_ref(a, span))
                .collect();
            base = self.types.generic_instance(base, args);
        }
        if re.is_pointer {
            base = self.types.pointer_to(base);
        }
        if re.is_array {
            base = self.types.array_of(base, re.dimensions.max(1));
        }
        if re.is_nullable {
            base = self.types.nullable_of(base);
        }
        base
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    pub(crate) fn analyze_decl(&mut self, decl: &ast::Decl) {
        match &decl.kind {
            DeclKind::Namespace(ns) => {
                let sym = self.define_simple(
                    ns.name,
                    SymbolKind::Namespace,
                    self.types.void(),
                    decl.span,
                );
                self.record(decl.id, sym, self.types.void());
                self.scopes.enter(ns.name, ScopeKind::Namespace);
                for d in &ns.decls {
                    self.analyze_decl(d);
                }
                self.scopes.exit();
            }
            DeclKind::Module(m) => {
                let sym =
                    self.define_simple(m.name, SymbolKind::Module, self.types.void(), decl.span);
                self.record(decl.id, sym, self.types.void());
                self.scopes.enter(m.name, ScopeKind::Module);
                for d in &m.decls {
                    self.analyze_decl(d);
                }
                self.scopes.exit();
            }
            DeclKind::Import(_) => {
                // Imports are passed through to the emitter's using set;
                // nothing to resolve here.
            }
            DeclKind::Class(class) => self.analyze_class(decl, class),
            DeclKind::Interface(iface) => self.analyze_interface(decl, iface),
            DeclKind::Enum(en) => self.analyze_enum(decl, en),
            DeclKind::Structure(st) => self.analyze_structure(decl, st),
            DeclKind::Callable(callable) => {
                self.analyze_callable(decl, callable);
            }
            DeclKind::Extern(ext) => self.analyze_extern(decl, ext),
            DeclKind::Delegate(del) => self.analyze_delegate(decl, del),
            DeclKind::Variable(var) => {
                self.analyze_variable(decl.id, var, decl.span);
            }
            DeclKind::Constant(c) => {
                self.analyze_constant(decl.id, c, decl.span);
            }
            DeclKind::TypeAlias(alias) => {
                let target = self.resolve_type_ref(&alias.target, decl.span);
                let ty = self
                    .types
                    .intern(alias.name, TypeKind::UserDefined { base: target });
                let sym = self.define_simple(alias.name, SymbolKind::Type, ty, decl.span);
                self.record(decl.id, sym, ty);
            }
            DeclKind::Property(_)
            | DeclKind::Event(_)
            | DeclKind::Operator(_)
            | DeclKind::Constructor(_) => {
                self.error(
                    codes::E_DUPLICATE_DEFINITION,
                    "member declaration outside a class",
                    decl.span,
                );
            }
        }
    }

    fn analyze_class(&mut self, decl: &ast::Decl, class: &ast::ClassDecl) {
        // Intern the class type first so members and the base clause can
        // reference it.
        let class_ty = self.types.intern(
            class.name,
            TypeKind::Class {
                base: None,
                interfaces: Vec::new(),
                members: IndexMap::new(),
            },
        );

        let base_ty = class.base.and_then(|base_name| {
            let resolved = self.types.lookup(base_name).or_else(|| {
                self.scopes
                    .resolve(base_name)
                    .map(|s| self.symbols.get(s).ty)
            });
            match resolved {
                Some(id)
                    if matches!(self.types.kind_of(id), TypeKind::Class { .. }) && id != class_ty =>
                {
                    Some(id)
                }
                Some(_) => {
                    self.error(
                        codes::E_NON_CLASS_BASE,
                        format!("base `{}` of `{}` is not a class", base_name, class.name),
                        decl.span,
                    );
                    None
                }
                None => {
                    self.error(
                        codes::E_UNKNOWN_TYPE,
                        format!("unknown base class `{}`", base_name),
                        decl.span,
                    );
                    None
                }
            }
        });

        let interface_tys: Vec<TypeId> = class
            .interfaces
            .iter()
            .filter_map(|name| {
                let resolved = self.types.lookup(*name);
                match resolved {
                    Some(id) if matches!(self.types.kind_of(id), TypeKind::Interface { .. }) => {
                        Some(id)
                    }
                    _ => {
                        self.error(
                            codes::E_UNKNOWN_TYPE,
                            format!("unknown interface `{}`", name),
                            decl.span,
                        );
                        None
                    }
                }
            })
            .collect();

        if let TypeKind::Class {
            base, interfaces, ..
        } = &mut self.types.get_mut(class_ty).kind
        {
            *base = base_ty;
            *interfaces = interface_tys;
        }

        let mut info = SymbolInfo::new(class.name, SymbolKind::Class, class_ty, decl.span);
        info.access = class.access;
        let sym = self.symbols.alloc(info);
        self.define_checked(class.name, sym, decl.span);
        self.record(decl.id, sym, class_ty);

        let class_scope = self.scopes.enter(class.name, ScopeKind::Class);
        let saved_class = self.current_class.replace(class_ty);

        for gp in &class.generic_params {
            let ty = self.types.intern(*gp, TypeKind::GenericParam);
            let sym = self.define_simple(*gp, SymbolKind::Type, ty, decl.span);
            let _ = sym;
        }

        for member in &class.members {
            match &member.kind {
                DeclKind::Callable(callable) => {
                    self.analyze_callable(member, callable);
                }
                DeclKind::Variable(var) => {
                    self.analyze_variable(member.id, var, member.span);
                }
                DeclKind::Constant(c) => {
                    self.analyze_constant(member.id, c, member.span);
                }
                DeclKind::Constructor(ctor) => self.analyze_constructor(member, ctor),
                DeclKind::Property(prop) => self.analyze_property(member, prop),
                DeclKind::Event(event) => self.analyze_event(member, event),
                DeclKind::Operator(op) => self.analyze_operator(member, op),
                _ => self.analyze_decl(member),
            }
        }

        // Populate the class type's member table from the resolved symbols.
        let members: IndexMap<Symbol, SymbolId> = self
            .scopes
            .get(class_scope)
            .bindings
            .iter()
            .map(|(name, id)| (*name, *id))
            .collect();
        if let TypeKind::Class { members: slot, .. } = &mut self.types.get_mut(class_ty).kind {
            *slot = members;
        }

        self.current_class = saved_class;
        self.scopes.exit();
    }

    fn analyze_interface(&mut self, decl: &ast::Decl, iface: &ast::InterfaceDecl) {
        let iface_ty = self.types.intern(
            iface.name,
            TypeKind::Interface {
                members: IndexMap::new(),
            },
        );
        let mut info = SymbolInfo::new(iface.name, SymbolKind::Interface, iface_ty, decl.span);
        info.access = iface.access;
        let sym = self.symbols.alloc(info);
        self.define_checked(iface.name, sym, decl.span);
        self.record(decl.id, sym, iface_ty);

        let scope = self.scopes.enter(iface.name, ScopeKind::Interface);
        for member in &iface.members {
            if let DeclKind::Callable(callable) = &member.kind {
                // Interface members may carry a default body, analyzed like
                // any other method.
                self.analyze_callable(member, callable);
            }
        }
        let members: IndexMap<Symbol, SymbolId> = self
            .scopes
            .get(scope)
            .bindings
            .iter()
            .map(|(name, id)| (*name, *id))
            .collect();
        if let TypeKind::Interface { members: slot } = &mut self.types.get_mut(iface_ty).kind {
            *slot = members;
        }
        self.scopes.exit();
    }

    fn analyze_enum(&mut self, decl: &ast::Decl, en: &ast::EnumDecl) {
        let underlying = match &en.underlying {
            Some(re) => self.resolve_type_ref(re, decl.span),
            None => self.types.integer(),
        };
        if !self.types.is_integral(underlying) && !self.types.is_error(underlying) {
            self.error(
                codes::E_TYPE_MISMATCH,
                format!("enum `{}` underlying type must be integral", en.name),
                decl.span,
            );
        }

        let mut members = IndexMap::new();
        let mut next = 0i64;
        for member in &en.members {
            let value = match &member.value {
                Some(expr) => match self.const_eval(expr) {
                    Some(ConstValue::Int(v)) => v,
                    _ => {
                        self.error(
                            codes::E_NON_CONSTANT_CASE,
                            format!(
                                "enum member `{}.{}` requires a constant integral value",
                                en.name, member.name
                            ),
                            decl.span,
                        );
                        next
                    }
                },
                None => next,
            };
            members.insert(member.name, value);
            next = value + 1;
        }

        let enum_ty = self.types.intern(
            en.name,
            TypeKind::Enum {
                underlying,
                members,
            },
        );
        let sym = self.define_simple(en.name, SymbolKind::Enum, enum_ty, decl.span);
        self.record(decl.id, sym, enum_ty);
    }

    fn analyze_structure(&mut self, decl: &ast::Decl, st: &ast::StructureDecl) {
        let fields: Vec<(Symbol, TypeId)> = st
            .fields
            .iter()
            .map(|f| (f.name, self.resolve_type_ref(&f.ty, decl.span)))
            .collect();
        let ty = self.types.intern(st.name, TypeKind::Structure { fields });
        let sym = self.define_simple(st.name, SymbolKind::Structure, ty, decl.span);
        self.record(decl.id, sym, ty);
    }

    fn analyze_delegate(&mut self, decl: &ast::Decl, del: &ast::DelegateDecl) {
        let params: Vec<TypeId> = del
            .params
            .iter()
            .map(|p| self.resolve_param_type(p))
            .collect();
        let ret = match &del.return_type {
            Some(re) => self.resolve_type_ref(re, decl.span),
            None => self.types.void(),
        };
        let ty = self.types.intern(del.name, TypeKind::Delegate { params, ret });
        let sym = self.define_simple(del.name, SymbolKind::Type, ty, decl.span);
        self.record(decl.id, sym, ty);
    }

    fn analyze_extern(&mut self, decl: &ast::Decl, ext: &ast::ExternDecl) {
        let params = self.resolve_params(&ext.params);
        let ret = match &ext.return_type {
            Some(re) => Some(self.resolve_type_ref(re, decl.span)),
            None => None,
        };
        let kind = if ext.is_function {
            SymbolKind::Function
        } else {
            SymbolKind::Subroutine
        };
        let mut info = SymbolInfo::new(ext.name, kind, self.types.void(), decl.span);
        info.return_type = Some(ret.unwrap_or(self.types.void()));
        info.params = params;
        info.extern_templates = ext.platforms.clone();
        info.flags.is_extern = true;
        let sym = self.symbols.alloc(info);
        self.define_checked(ext.name, sym, decl.span);
        self.record(decl.id, sym, self.types.void());
    }

    /// Analyze a function or subroutine; returns its symbol.
    pub(crate) fn analyze_callable(
        &mut self,
        decl: &ast::Decl,
        callable: &ast::CallableDecl,
    ) -> SymbolId {
        let params = self.resolve_params(&callable.params);
        let ret = match &callable.return_type {
            Some(re) => self.resolve_type_ref(re, decl.span),
            None => self.types.void(),
        };

        let kind = match callable.kind {
            ast::CallableKind::Function => SymbolKind::Function,
            ast::CallableKind::Subroutine => SymbolKind::Subroutine,
        };
        let mut info = SymbolInfo::new(callable.name, kind, self.types.void(), decl.span);
        info.return_type = Some(ret);
        info.params = params.clone();
        info.access = callable.modifiers.access;
        info.flags.is_static = callable.modifiers.is_static;
        let sym = self.symbols.alloc(info);
        self.define_checked(callable.name, sym, decl.span);
        self.record(decl.id, sym, ret);

        let scope_kind = match callable.kind {
            ast::CallableKind::Function => ScopeKind::Function,
            ast::CallableKind::Subroutine => ScopeKind::Subroutine,
        };
        let return_type = match callable.kind {
            ast::CallableKind::Function => Some(ret),
            ast::CallableKind::Subroutine => None,
        };
        self.scopes
            .enter_callable(callable.name, scope_kind, return_type);

        for (param, info) in callable.params.iter().zip(params.iter()) {
            let mut pinfo =
                SymbolInfo::new(param.name, SymbolKind::Parameter, info.ty, param.span);
            pinfo.flags.is_constant = false;
            let pid = self.symbols.alloc(pinfo);
            self.define_checked(param.name, pid, param.span);
            self.record(param.id, pid, info.ty);
        }

        let saved_iterator = self.in_iterator;
        self.in_iterator = callable.modifiers.is_iterator;

        if let Some(body) = &callable.body {
            for stmt in &body.stmts {
                self.analyze_stmt(stmt);
            }
        }

        self.in_iterator = saved_iterator;
        self.scopes.exit();
        sym
    }

    fn analyze_constructor(&mut self, decl: &ast::Decl, ctor: &ast::ConstructorDecl) {
        let params = self.resolve_params(&ctor.params);
        let name = Symbol::intern("New");
        let mut info = SymbolInfo::new(name, SymbolKind::Subroutine, self.types.void(), decl.span);
        info.params = params.clone();
        info.access = ctor.access;
        let sym = self.symbols.alloc(info);
        // Multiple constructors would collide here; overloading is resolved
        // by arity at the member table, so only the first binds the name.
        let _ = self.scopes.define(name, sym);
        self.record(decl.id, sym, self.types.void());

        self.scopes
            .enter_callable(name, ScopeKind::Subroutine, None);
        for (param, pinfo) in ctor.params.iter().zip(params.iter()) {
            let mut si = SymbolInfo::new(param.name, SymbolKind::Parameter, pinfo.ty, param.span);
            si.flags.is_constant = false;
            let pid = self.symbols.alloc(si);
            self.define_checked(param.name, pid, param.span);
            self.record(param.id, pid, pinfo.ty);
        }
        for arg in &ctor.base_args {
            self.infer_expr(arg);
        }
        for stmt in &ctor.body.stmts {
            self.analyze_stmt(stmt);
        }
        self.scopes.exit();
    }

    fn analyze_property(&mut self, decl: &ast::Decl, prop: &ast::PropertyDecl) {
        let ty = self.resolve_type_ref(&prop.ty, decl.span);
        let mut info = SymbolInfo::new(prop.name, SymbolKind::Variable, ty, decl.span);
        info.access = prop.modifiers.access;
        info.flags.is_static = prop.modifiers.is_static;
        let sym = self.symbols.alloc(info);
        self.define_checked(prop.name, sym, decl.span);
        self.record(decl.id, sym, ty);

        if let Some(getter) = &prop.getter {
            self.scopes
                .enter_callable(prop.name, ScopeKind::Function, Some(ty));
            for stmt in &getter.stmts {
                self.analyze_stmt(stmt);
            }
            self.scopes.exit();
        }
        if let Some(setter) = &prop.setter {
            self.scopes
                .enter_callable(prop.name, ScopeKind::Subroutine, None);
            let value_name = prop.setter_param.unwrap_or_else(|| Symbol::intern("value"));
            let vid = self.symbols.alloc(SymbolInfo::new(
                value_name,
                SymbolKind::Parameter,
                ty,
                decl.span,
            ));
            let _ = self.scopes.define(value_name, vid);
            for stmt in &setter.stmts {
                self.analyze_stmt(stmt);
            }
            self.scopes.exit();
        }
    }

    fn analyze_event(&mut self, decl: &ast::Decl, event: &ast::EventDecl) {
        let ty = self.resolve_type_ref(&event.ty, decl.span);
        if !matches!(
            self.types.kind_of(self.types.resolve_alias(ty)),
            TypeKind::Delegate { .. } | TypeKind::Error
        ) {
            self.error(
                codes::E_TYPE_MISMATCH,
                format!("event `{}` requires a delegate type", event.name),
                decl.span,
            );
        }
        let sym = self.define_simple(event.name, SymbolKind::Event, ty, decl.span);
        self.record(decl.id, sym, ty);
    }

    fn analyze_operator(&mut self, decl: &ast::Decl, op: &ast::OperatorDecl) {
        let params = self.resolve_params(&op.params);
        let ret = self.resolve_type_ref(&op.return_type, decl.span);
        let mut info = SymbolInfo::new(op.symbol, SymbolKind::Function, self.types.void(), decl.span);
        info.return_type = Some(ret);
        info.params = params.clone();
        let sym = self.symbols.alloc(info);
        let _ = self.scopes.define(op.symbol, sym);
        self.record(decl.id, sym, ret);

        self.scopes
            .enter_callable(op.symbol, ScopeKind::Function, Some(ret));
        for (param, pinfo) in op.params.iter().zip(params.iter()) {
            let pid = self.symbols.alloc(SymbolInfo::new(
                param.name,
                SymbolKind::Parameter,
                pinfo.ty,
                param.span,
            ));
            self.define_checked(param.name, pid, param.span);
            self.record(param.id, pid, pinfo.ty);
        }
        for stmt in &op.body.stmts {
            self.analyze_stmt(stmt);
        }
        self.scopes.exit();
    }

    /// Analyze a variable declaration (global, field, or local).
    pub(crate) fn analyze_variable(
        &mut self,
        node: NodeId,
        var: &ast::VariableDecl,
        span: Span,
    ) -> SymbolId {
        let init_ty = var.init.as_ref().map(|e| self.infer_expr(e));

        let ty = match (&var.ty, init_ty) {
            (Some(re), _) => self.resolve_type_ref(re, span),
            (None, Some(inferred)) => inferred,
            (None, None) => {
                self.error(
                    codes::E_TYPE_MISMATCH,
                    format!("variable `{}` needs a type or an initializer", var.name),
                    span,
                );
                self.types.error()
            }
        };

        if let (Some(init), Some(declared)) = (init_ty, var.ty.as_ref().map(|_| ty)) {
            if !self.types.is_assignable_from(declared, init) {
                self.error(
                    codes::E_TYPE_MISMATCH,
                    format!(
                        "cannot initialize `{}` of type `{}` from `{}`",
                        var.name,
                        self.types.name_of(declared),
                        self.types.name_of(init)
                    ),
                    span,
                );
            }
        }

        let mut info = SymbolInfo::new(var.name, SymbolKind::Variable, ty, span);
        info.access = var.access;
        info.flags.is_static = var.is_static;
        let sym = self.symbols.alloc(info);
        self.define_checked(var.name, sym, span);
        self.node_symbols.insert(node, sym);
        self.node_types.insert(node, ty);
        sym
    }

    /// Analyze a constant declaration.
    pub(crate) fn analyze_constant(
        &mut self,
        node: NodeId,
        c: &ast::ConstantDecl,
        span: Span,
    ) -> SymbolId {
        let value_ty = self.infer_expr(&c.value);
        let ty = match &c.ty {
            Some(re) => {
                let declared = self.resolve_type_ref(re, span);
                if !self.types.is_assignable_from(declared, value_ty) {
                    self.error(
                        codes::E_TYPE_MISMATCH,
                        format!(
                            "cannot initialize constant `{}` of type `{}` from `{}`",
                            c.name,
                            self.types.name_of(declared),
                            self.types.name_of(value_ty)
                        ),
                        span,
                    );
                }
                declared
            }
            None => value_ty,
        };

        let mut info = SymbolInfo::new(c.name, SymbolKind::Constant, ty, span);
        info.access = c.access;
        info.flags.is_constant = true;
        info.const_value = self.const_eval(&c.value);
        let sym = self.symbols.alloc(info);
        self.define_checked(c.name, sym, span);
        self.node_symbols.insert(node, sym);
        self.node_types.insert(node, ty);
        sym
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub(crate) fn analyze_stmt(&mut self, stmt: &ast::Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.scopes.enter(Symbol::intern("<block>"), ScopeKind::Block);
                for s in &block.stmts {
                    self.analyze_stmt(s);
                }
                self.scopes.exit();
            }
            StmtKind::Local(var) => {
                self.analyze_variable(stmt.id, var, stmt.span);
            }
            StmtKind::LocalConst(c) => {
                self.analyze_constant(stmt.id, c, stmt.span);
            }
            StmtKind::If(if_stmt) => self.analyze_if(if_stmt, stmt.span),
            StmtKind::Select(select) => self.analyze_select(select, stmt.span),
            StmtKind::For(for_stmt) => self.analyze_for(for_stmt, stmt.span),
            StmtKind::ForEach(fe) => self.analyze_foreach(fe, stmt.span),
            StmtKind::While(w) => {
                self.check_condition(&w.cond);
                self.scopes.enter(Symbol::intern("<while>"), ScopeKind::Loop);
                self.loop_stack.push(LoopKind::While);
                self.analyze_block(&w.body);
                self.loop_stack.pop();
                self.scopes.exit();
            }
            StmtKind::DoLoop(d) => {
                self.check_condition(&d.cond);
                self.scopes.enter(Symbol::intern("<do>"), ScopeKind::Loop);
                self.loop_stack.push(LoopKind::Do);
                self.analyze_block(&d.body);
                self.loop_stack.pop();
                self.scopes.exit();
            }
            StmtKind::Try(t) => self.analyze_try(t, stmt.span),
            StmtKind::With(w) => {
                let subject_ty = self.infer_expr(&w.subject);
                self.with_stack.push(subject_ty);
                self.scopes.enter(Symbol::intern("<with>"), ScopeKind::Block);
                self.analyze_block(&w.body);
                self.scopes.exit();
                self.with_stack.pop();
            }
            StmtKind::Return(value) => self.analyze_return(value.as_ref(), stmt.span),
            StmtKind::Exit(kind) => self.analyze_exit(*kind, stmt.span),
            StmtKind::Throw(value) => {
                if let Some(v) = value {
                    self.infer_expr(v);
                }
            }
            StmtKind::RaiseEvent { event, args } => {
                for arg in args {
                    self.infer_expr(arg);
                }
                match self.scopes.resolve(*event) {
                    Some(sym) if self.symbols.get(sym).kind == SymbolKind::Event => {}
                    Some(_) => self.error(
                        codes::E_TYPE_MISMATCH,
                        format!("`{}` is not an event", event),
                        stmt.span,
                    ),
                    None => self.error(
                        codes::E_UNDEFINED_SYMBOL,
                        format!("undefined event `{}`", event),
                        stmt.span,
                    ),
                }
            }
            StmtKind::AddHandler { event, handler }
            | StmtKind::RemoveHandler { event, handler } => {
                self.infer_expr(event);
                self.infer_expr(handler);
            }
            StmtKind::Yield(value) => {
                if !self.in_iterator {
                    self.error(
                        codes::E_YIELD_OUTSIDE_ITERATOR,
                        "Yield outside an iterator function",
                        stmt.span,
                    );
                }
                if let Some(v) = value {
                    self.infer_expr(v);
                }
            }
            StmtKind::Expression(expr) => {
                self.infer_expr(expr);
            }
            StmtKind::Assignment(assign) => self.analyze_assignment(assign, stmt.span),
        }
    }

    pub(crate) fn analyze_block(&mut self, block: &ast::Block) {
        self.scopes.enter(Symbol::intern("<block>"), ScopeKind::Block);
        for s in &block.stmts {
            self.analyze_stmt(s);
        }
        self.scopes.exit();
    }

    fn analyze_if(&mut self, if_stmt: &ast::IfStmt, _span: Span) {
        self.check_condition(&if_stmt.cond);
        self.analyze_block(&if_stmt.then_block);
        for arm in &if_stmt.else_ifs {
            self.check_condition(&arm.cond);
            self.analyze_block(&arm.block);
        }
        if let Some(else_block) = &if_stmt.else_block {
            self.analyze_block(else_block);
        }
    }

    fn analyze_select(&mut self, select: &ast::SelectStmt, span: Span) {
        let scrutinee_ty = self.infer_expr(&select.scrutinee);

        for case in &select.cases {
            self.scopes.enter(Symbol::intern("<case>"), ScopeKind::Block);
            for pattern in &case.patterns {
                match &pattern.kind {
                    CasePatternKind::Constant(expr) => {
                        let label_ty = self.infer_expr(expr);
                        if self.const_eval(expr).is_none() {
                            self.error(
                                codes::E_NON_CONSTANT_CASE,
                                "Select case label must be a compile-time constant",
                                pattern.span,
                            );
                        }
                        if !self.types.are_compatible(scrutinee_ty, label_ty) {
                            self.warning(
                                codes::W_INCOMPARABLE_TYPES,
                                format!(
                                    "case label type `{}` is unrelated to `{}`",
                                    self.types.name_of(label_ty),
                                    self.types.name_of(scrutinee_ty)
                                ),
                                pattern.span,
                            );
                        }
                    }
                    CasePatternKind::Range { lo, hi } => {
                        let lo_ty = self.infer_expr(lo);
                        let hi_ty = self.infer_expr(hi);
                        if !self.types.is_numeric(lo_ty) || !self.types.is_numeric(hi_ty) {
                            self.error(
                                codes::E_NON_NUMERIC_OPERAND,
                                "range case bounds must be numeric",
                                pattern.span,
                            );
                        }
                    }
                    CasePatternKind::Comparison { op, rhs } => {
                        if !op.is_comparison() {
                            self.error(
                                codes::E_TYPE_MISMATCH,
                                "comparison case requires a relational operator",
                                pattern.span,
                            );
                        }
                        self.infer_expr(rhs);
                    }
                    CasePatternKind::Type { ty, binding } => {
                        let target = self.resolve_type_ref(ty, pattern.span);
                        self.node_types.insert(pattern.id, target);
                        if let Some(name) = binding {
                            // The binding is visible in this case's body.
                            let sym = self.symbols.alloc(SymbolInfo::new(
                                *name,
                                SymbolKind::Variable,
                                target,
                                pattern.span,
                            ));
                            self.define_checked(*name, sym, pattern.span);
                            self.node_symbols.insert(pattern.id, sym);
                        }
                    }
                }
                if let Some(guard) = &pattern.guard {
                    self.check_condition(guard);
                }
            }
            for s in &case.body.stmts {
                self.analyze_stmt(s);
            }
            self.scopes.exit();
        }

        if let Some(default) = &select.default {
            self.analyze_block(default);
        }
        let _ = span;
    }

    fn analyze_for(&mut self, for_stmt: &ast::ForStmt, span: Span) {
        let start_ty = self.infer_expr(&for_stmt.start);
        let end_ty = self.infer_expr(&for_stmt.end);
        if let Some(step) = &for_stmt.step {
            let step_ty = self.infer_expr(step);
            if !self.types.is_numeric(step_ty) {
                self.error(
                    codes::E_NON_NUMERIC_OPERAND,
                    "For step must be numeric",
                    span,
                );
            }
        }
        if !self.types.is_numeric(start_ty) || !self.types.is_numeric(end_ty) {
            self.error(
                codes::E_NON_NUMERIC_OPERAND,
                "For bounds must be numeric",
                span,
            );
        }

        let var_ty = self
            .types
            .common_numeric_type(start_ty, end_ty)
            .unwrap_or(self.types.integer());

        self.scopes.enter(Symbol::intern("<for>"), ScopeKind::Loop);
        let sym = self
            .symbols
            .alloc(SymbolInfo::new(for_stmt.var, SymbolKind::Variable, var_ty, span));
        let _ = self.scopes.define(for_stmt.var, sym);
        self.loop_stack.push(LoopKind::For);
        self.analyze_block(&for_stmt.body);
        self.loop_stack.pop();
        self.scopes.exit();
    }

    fn analyze_foreach(&mut self, fe: &ast::ForEachStmt, span: Span) {
        let coll_ty = self.infer_expr(&fe.collection);
        let elem_ty = match self.types.kind_of(self.types.resolve_alias(coll_ty)) {
            TypeKind::Array { elem, .. } => *elem,
            TypeKind::Error => self.types.error(),
            _ => {
                self.error(
                    codes::E_TYPE_MISMATCH,
                    format!(
                        "For Each requires an array, found `{}`",
                        self.types.name_of(coll_ty)
                    ),
                    span,
                );
                self.types.error()
            }
        };

        let var_ty = match &fe.var_ty {
            Some(re) => {
                let declared = self.resolve_type_ref(re, span);
                if !self.types.is_assignable_from(declared, elem_ty) {
                    self.error(
                        codes::E_TYPE_MISMATCH,
                        format!(
                            "element type `{}` is not assignable to `{}`",
                            self.types.name_of(elem_ty),
                            self.types.name_of(declared)
                        ),
                        span,
                    );
                }
                declared
            }
            None => elem_ty,
        };

        self.scopes.enter(Symbol::intern("<foreach>"), ScopeKind::Loop);
        let sym = self
            .symbols
            .alloc(SymbolInfo::new(fe.var, SymbolKind::Variable, var_ty, span));
        let _ = self.scopes.define(fe.var, sym);
        self.loop_stack.push(LoopKind::For);
        self.analyze_block(&fe.body);
        self.loop_stack.pop();
        self.scopes.exit();
    }

    fn analyze_try(&mut self, t: &ast::TryStmt, span: Span) {
        self.analyze_block(&t.body);
        for clause in &t.catches {
            self.scopes.enter(Symbol::intern("<catch>"), ScopeKind::Block);
            let caught_ty = match &clause.ty {
                Some(re) => self.resolve_type_ref(re, span),
                None => self.types.object(),
            };
            if let Some(var) = clause.var {
                let sym = self
                    .symbols
                    .alloc(SymbolInfo::new(var, SymbolKind::Variable, caught_ty, span));
                let _ = self.scopes.define(var, sym);
            }
            if let Some(when) = &clause.when {
                self.check_condition(when);
            }
            for s in &clause.body.stmts {
                self.analyze_stmt(s);
            }
            self.scopes.exit();
        }
        if let Some(finally) = &t.finally {
            self.analyze_block(finally);
        }
    }

    fn analyze_return(&mut self, value: Option<&ast::Expr>, span: Span) {
        match self.scopes.enclosing_return_type() {
            None => {
                self.error(
                    codes::E_RETURN_OUTSIDE_CALLABLE,
                    "Return outside a function or subroutine",
                    span,
                );
                if let Some(v) = value {
                    self.infer_expr(v);
                }
            }
            Some(None) => {
                if let Some(v) = value {
                    self.infer_expr(v);
                    self.error(
                        codes::E_TYPE_MISMATCH,
                        "a subroutine cannot return a value",
                        span,
                    );
                }
            }
            Some(Some(expected)) => match value {
                Some(v) => {
                    let found = self.infer_expr(v);
                    if !self.types.is_assignable_from(expected, found) {
                        self.error(
                            codes::E_TYPE_MISMATCH,
                            format!(
                                "return type mismatch: expected `{}`, found `{}`",
                                self.types.name_of(expected),
                                self.types.name_of(found)
                            ),
                            span,
                        );
                    }
                }
                None => {
                    self.error(
                        codes::E_TYPE_MISMATCH,
                        "a function must return a value",
                        span,
                    );
                }
            },
        }
    }

    fn analyze_exit(&mut self, kind: ast::ExitKind, span: Span) {
        let ok = match kind {
            ast::ExitKind::For => self.loop_stack.contains(&LoopKind::For),
            ast::ExitKind::Do => self.loop_stack.contains(&LoopKind::Do),
            ast::ExitKind::While => self.loop_stack.contains(&LoopKind::While),
            ast::ExitKind::Sub => self.scopes.nearest(ScopeKind::Subroutine).is_some(),
            ast::ExitKind::Function => self.scopes.nearest(ScopeKind::Function).is_some(),
        };
        if !ok {
            self.error(
                codes::E_EXIT_KIND_MISMATCH,
                format!("Exit {:?} outside a matching construct", kind),
                span,
            );
        }
    }

    fn analyze_assignment(&mut self, assign: &ast::AssignStmt, span: Span) {
        let target_ty = self.infer_expr(&assign.target);
        let value_ty = self.infer_expr(&assign.value);

        match assign.op {
            ast::AssignOp::Assign => {
                if !self.types.is_assignable_from(target_ty, value_ty) {
                    self.error(
                        codes::E_TYPE_MISMATCH,
                        format!(
                            "cannot assign `{}` to `{}`",
                            self.types.name_of(value_ty),
                            self.types.name_of(target_ty)
                        ),
                        span,
                    );
                }
            }
            _ => {
                // Compound operators require both sides numeric.
                if !self.types.is_numeric(target_ty) || !self.types.is_numeric(value_ty) {
                    self.error(
                        codes::E_NON_NUMERIC_OPERAND,
                        "compound assignment requires numeric operands",
                        span,
                    );
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Warn when a logical-position condition is not Boolean.
    pub(crate) fn check_condition(&mut self, cond: &ast::Expr) {
        let ty = self.infer_expr(cond);
        if !self.types.is_boolean(ty) {
            self.warning(
                codes::W_NON_BOOLEAN_CONDITION,
                format!(
                    "condition has type `{}`, expected `Boolean`",
                    self.types.name_of(ty)
                ),
                cond.span,
            );
        }
    }

    pub(crate) fn resolve_params(&mut self, params: &[ast::Parameter]) -> Vec<ParamInfo> {
        params
            .iter()
            .map(|p| ParamInfo {
                name: p.name,
                ty: self.resolve_param_type(p),
                by_ref: p.by_ref,
            })
            .collect()
    }

    pub(crate) fn resolve_param_type(&mut self, p: &ast::Parameter) -> TypeId {
        match &p.ty {
            Some(re) => self.resolve_type_ref(re, p.span),
            None => self.types.object(),
        }
    }

    fn define_simple(
        &mut self,
        name: Symbol,
        kind: SymbolKind,
        ty: TypeId,
        span: Span,
    ) -> SymbolId {
        let sym = self.symbols.alloc(SymbolInfo::new(name, kind, ty, span));
        self.define_checked(name, sym, span);
        sym
    }

    pub(crate) fn define_checked(&mut self, name: Symbol, sym: SymbolId, span: Span) {
        if self.scopes.define(name, sym).is_err() {
            self.error(
                codes::E_DUPLICATE_DEFINITION,
                format!("`{}` is already defined in this scope", name),
                span,
            );
        }
    }

    fn record(&mut self, node: NodeId, sym: SymbolId, ty: TypeId) {
        self.node_symbols.insert(node, sym);
        self.node_types.insert(node, ty);
    }

    /// Evaluate a compile-time constant expression.
    ///
    /// Covers literals, negation of numeric literals, references to Constant
    /// symbols, and enum member accesses; anything else is not constant.
    pub(crate) fn const_eval(&self, expr: &ast::Expr) -> Option<ConstValue> {
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
            ExprKind::Identifier(name) => {
                let sym = self.scopes.resolve(*name)?;
                let info = self.symbols.get(sym);
                if info.flags.is_constant {
                    info.const_value.clone()
                } else {
                    None
                }
            }
            ExprKind::MemberAccess { object, member } => {
                if let ExprKind::Identifier(type_name) = &object.kind {
                    let ty = self.types.lookup(*type_name)?;
                    if let TypeKind::Enum { members, .. } = self.types.kind_of(ty) {
                        return members.get(member).map(|v| ConstValue::Int(*v));
                    }
                }
                None
            }
            _ => None,
        }
    }
}
