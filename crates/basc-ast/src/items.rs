//! Declaration nodes.

use crate::{Block, Expr, TypeRef};
use basc_util::{NodeId, Span, Symbol};

/// A declaration node.
#[derive(Debug, Clone)]
pub struct Decl {
    pub id: NodeId,
    pub span: Span,
    pub kind: DeclKind,
}

/// Declaration kinds.
#[derive(Debug, Clone)]
pub enum DeclKind {
    /// Namespace with nested declarations.
    Namespace(NamespaceDecl),

    /// Module with nested declarations.
    Module(ModuleDecl),

    /// Import / Using directive.
    Import(ImportDecl),

    /// Class declaration.
    Class(ClassDecl),

    /// Interface declaration.
    Interface(InterfaceDecl),

    /// Enum declaration.
    Enum(EnumDecl),

    /// Structure (record-like) declaration.
    Structure(StructureDecl),

    /// Function or Subroutine.
    Callable(CallableDecl),

    /// Property with getter/setter blocks.
    Property(PropertyDecl),

    /// Event declaration.
    Event(EventDecl),

    /// Operator declaration.
    Operator(OperatorDecl),

    /// Constructor declaration.
    Constructor(ConstructorDecl),

    /// Extern declaration with per-platform implementation templates.
    Extern(ExternDecl),

    /// Delegate type declaration.
    Delegate(DelegateDecl),

    /// Variable declaration.
    Variable(VariableDecl),

    /// Constant declaration.
    Constant(ConstantDecl),

    /// Type alias.
    TypeAlias(TypeAliasDecl),
}

/// Access levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    #[default]
    Public,
    Private,
    Protected,
    Friend,
}

/// Modifier set on a callable or member.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub access: AccessLevel,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_async: bool,
    pub is_iterator: bool,
}

/// Namespace declaration.
#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub name: Symbol,
    pub decls: Vec<Decl>,
}

/// Module declaration.
#[derive(Debug, Clone)]
pub struct ModuleDecl {
    pub name: Symbol,
    pub decls: Vec<Decl>,
}

/// Import / Using directive.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: Symbol,
}

/// Class declaration.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Symbol,
    pub generic_params: Vec<Symbol>,
    pub base: Option<Symbol>,
    pub interfaces: Vec<Symbol>,
    pub members: Vec<Decl>,
    pub access: AccessLevel,
}

/// Interface declaration. Callable members with a body are default methods.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: Symbol,
    pub members: Vec<Decl>,
    pub access: AccessLevel,
}

/// Enum declaration.
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Symbol,
    pub underlying: Option<TypeRef>,
    pub members: Vec<EnumMember>,
}

/// One enum member with an optional explicit value.
#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: Symbol,
    pub value: Option<Expr>,
}

/// Structure declaration: a record-like member list.
#[derive(Debug, Clone)]
pub struct StructureDecl {
    pub name: Symbol,
    pub fields: Vec<StructureField>,
}

/// One structure field.
#[derive(Debug, Clone)]
pub struct StructureField {
    pub name: Symbol,
    pub ty: TypeRef,
}

/// Whether a callable returns a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Subroutine,
}

/// Function or Subroutine declaration.
#[derive(Debug, Clone)]
pub struct CallableDecl {
    pub name: Symbol,
    pub kind: CallableKind,
    pub generic_params: Vec<Symbol>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeRef>,
    pub implements: Option<Symbol>,
    pub modifiers: Modifiers,
    /// Absent for abstract and interface-signature members.
    pub body: Option<Block>,
    /// True for extension methods; the first parameter is the receiver.
    pub is_extension: bool,
}

/// A formal parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: NodeId,
    pub span: Span,
    pub name: Symbol,
    /// Absent on inferred lambda parameters.
    pub ty: Option<TypeRef>,
    pub default: Option<Expr>,
    pub by_ref: bool,
}

/// Property declaration.
#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: Symbol,
    pub ty: TypeRef,
    pub getter: Option<Block>,
    pub setter: Option<Block>,
    /// Name of the setter's value parameter; defaults to `value`.
    pub setter_param: Option<Symbol>,
    pub modifiers: Modifiers,
}

/// Event declaration.
#[derive(Debug, Clone)]
pub struct EventDecl {
    pub name: Symbol,
    /// The delegate type carried by the event.
    pub ty: TypeRef,
}

/// Operator declaration.
#[derive(Debug, Clone)]
pub struct OperatorDecl {
    pub symbol: Symbol,
    pub params: Vec<Parameter>,
    pub return_type: TypeRef,
    pub body: Block,
    pub is_widening: bool,
    pub is_narrowing: bool,
}

/// Constructor declaration.
#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub params: Vec<Parameter>,
    /// Arguments forwarded to the base-class constructor.
    pub base_args: Vec<Expr>,
    pub body: Block,
    pub access: AccessLevel,
}

/// Target platforms for extern implementation templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    CSharp,
    Cpp,
    Llvm,
    Msil,
}

/// Extern declaration: implementation is a per-platform template string.
#[derive(Debug, Clone)]
pub struct ExternDecl {
    pub name: Symbol,
    pub is_function: bool,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeRef>,
    /// Platform tag to implementation template, in declaration order.
    pub platforms: Vec<(Platform, String)>,
}

/// Delegate type declaration.
#[derive(Debug, Clone)]
pub struct DelegateDecl {
    pub name: Symbol,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeRef>,
}

/// Variable declaration. `is_auto` variables infer their type from the
/// initializer.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: Symbol,
    pub ty: Option<TypeRef>,
    pub init: Option<Expr>,
    pub is_auto: bool,
    pub is_static: bool,
    pub access: AccessLevel,
}

/// Constant declaration.
#[derive(Debug, Clone)]
pub struct ConstantDecl {
    pub name: Symbol,
    pub ty: Option<TypeRef>,
    pub value: Expr,
    pub access: AccessLevel,
}

/// Type alias declaration.
#[derive(Debug, Clone)]
pub struct TypeAliasDecl {
    pub name: Symbol,
    pub target: TypeRef,
}
