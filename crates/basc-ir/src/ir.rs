//! IR data model: module, functions, basic blocks, instructions.

use basc_ast::Platform;
use basc_sem::{CastKind, ConstValue, TypeId};
use basc_util::{define_idx, IndexVec, Span, Symbol};
use indexmap::IndexMap;

define_idx!(
    /// Handle to a basic block within its function.
    BlockId
);

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
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
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitwiseNot,
    Inc,
    Dec,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An instruction operand: an inline constant or a reference to a named
/// value (parameter, local, global, or compiler temp).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant(ConstValue),
    Ref(Symbol),
}

impl Value {
    pub fn as_ref_name(&self) -> Option<Symbol> {
        match self {
            Value::Ref(name) => Some(*name),
            Value::Constant(_) => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Constant(c) => write!(f, "{}", c),
            Value::Ref(name) => write!(f, "%{}", name),
        }
    }
}

/// One arm of a Switch terminator; several case values may share a target.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub values: Vec<ConstValue>,
    pub target: BlockId,
}

/// Instruction kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    // Arithmetic and logic
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    Unary {
        op: UnaryOp,
        operand: Value,
    },
    Compare {
        op: CompareOp,
        lhs: Value,
        rhs: Value,
    },

    // Memory
    Load {
        addr: Value,
    },
    Store {
        addr: Value,
        value: Value,
    },
    /// Address alias for a declared name; the result is `<name>_addr`.
    Alloca {
        name: Symbol,
    },
    GetElementPtr {
        base: Value,
        indices: Vec<Value>,
    },
    ArrayAlloc {
        elem: TypeId,
        dims: Vec<Value>,
    },
    ArrayStore {
        array: Value,
        indices: Vec<Value>,
        value: Value,
    },

    // Control
    Branch {
        target: BlockId,
    },
    CondBranch {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        value: Value,
        arms: Vec<SwitchArm>,
        default: BlockId,
    },
    Return {
        value: Option<Value>,
    },
    Label {
        name: Symbol,
    },

    // Calls
    Call {
        callee: Symbol,
        args: Vec<Value>,
    },
    MethodCall {
        object: Value,
        method: Symbol,
        args: Vec<Value>,
    },
    BaseCall {
        method: Symbol,
        args: Vec<Value>,
    },

    // Object model
    NewObject {
        class: TypeId,
        args: Vec<Value>,
    },
    FieldAccess {
        object: Value,
        field: Symbol,
    },
    FieldStore {
        object: Value,
        field: Symbol,
        value: Value,
    },

    // SSA
    Phi {
        incomings: Vec<(Value, BlockId)>,
    },

    // Type conversion
    Cast {
        kind: CastKind,
        value: Value,
        target: TypeId,
    },

    // Async / iterators
    Await {
        value: Value,
    },
    /// Yield a value, or `None` for yield break.
    Yield {
        value: Option<Value>,
    },

    // Exceptions
    Throw {
        value: Option<Value>,
    },
    /// AddHandler / RemoveHandler, rendered as `event += handler`.
    HandlerBind {
        event: Value,
        handler: Value,
        add: bool,
    },

    // Misc
    /// Non-SSA assignment to a declared name.
    Assign {
        target: Symbol,
        value: Value,
    },
    Comment(String),
}

/// One IR instruction. Value-producing instructions carry a result name;
/// the type is the result type (void for the rest).
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub kind: InstKind,
    pub result: Option<Symbol>,
    pub ty: TypeId,
    pub span: Span,
}

impl Inst {
    /// True for branch, conditional branch, switch, and return.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Branch { .. }
                | InstKind::CondBranch { .. }
                | InstKind::Switch { .. }
                | InstKind::Return { .. }
        )
    }

    /// Successor blocks named by a terminator.
    pub fn targets(&self) -> Vec<BlockId> {
        match &self.kind {
            InstKind::Branch { target } => vec![*target],
            InstKind::CondBranch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            InstKind::Switch { arms, default, .. } => {
                let mut out: Vec<BlockId> = arms.iter().map(|a| a.target).collect();
                out.push(*default);
                out
            }
            _ => Vec::new(),
        }
    }

    /// All value operands, in evaluation order.
    pub fn operands(&self) -> Vec<&Value> {
        match &self.kind {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Compare { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            InstKind::Unary { operand, .. } => vec![operand],
            InstKind::Load { addr } => vec![addr],
            InstKind::Store { addr, value } => vec![addr, value],
            InstKind::Alloca { .. } => Vec::new(),
            InstKind::GetElementPtr { base, indices } => {
                let mut out = vec![base];
                out.extend(indices.iter());
                out
            }
            InstKind::ArrayAlloc { dims, .. } => dims.iter().collect(),
            InstKind::ArrayStore {
                array,
                indices,
                value,
            } => {
                let mut out = vec![array];
                out.extend(indices.iter());
                out.push(value);
                out
            }
            InstKind::Branch { .. } | InstKind::Label { .. } | InstKind::Comment(_) => Vec::new(),
            InstKind::CondBranch { cond, .. } => vec![cond],
            InstKind::Switch { value, .. } => vec![value],
            InstKind::Return { value } => value.iter().collect(),
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::MethodCall { object, args, .. } => {
                let mut out = vec![object];
                out.extend(args.iter());
                out
            }
            InstKind::BaseCall { args, .. } => args.iter().collect(),
            InstKind::NewObject { args, .. } => args.iter().collect(),
            InstKind::FieldAccess { object, .. } => vec![object],
            InstKind::FieldStore { object, value, .. } => vec![object, value],
            InstKind::Phi { incomings } => incomings.iter().map(|(v, _)| v).collect(),
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Await { value } => vec![value],
            InstKind::Yield { value } => value.iter().collect(),
            InstKind::Throw { value } => value.iter().collect(),
            InstKind::HandlerBind { event, handler, .. } => vec![event, handler],
            InstKind::Assign { value, .. } => vec![value],
        }
    }

    /// Mutable view of all value operands, for rewriting passes.
    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match &mut self.kind {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Compare { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            InstKind::Unary { operand, .. } => vec![operand],
            InstKind::Load { addr } => vec![addr],
            InstKind::Store { addr, value } => vec![addr, value],
            InstKind::Alloca { .. } => Vec::new(),
            InstKind::GetElementPtr { base, indices } => {
                let mut out = vec![base];
                out.extend(indices.iter_mut());
                out
            }
            InstKind::ArrayAlloc { dims, .. } => dims.iter_mut().collect(),
            InstKind::ArrayStore {
                array,
                indices,
                value,
            } => {
                let mut out = vec![array];
                out.extend(indices.iter_mut());
                out.push(value);
                out
            }
            InstKind::Branch { .. } | InstKind::Label { .. } | InstKind::Comment(_) => Vec::new(),
            InstKind::CondBranch { cond, .. } => vec![cond],
            InstKind::Switch { value, .. } => vec![value],
            InstKind::Return { value } => value.iter_mut().collect(),
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::MethodCall { object, args, .. } => {
                let mut out = vec![object];
                out.extend(args.iter_mut());
                out
            }
            InstKind::BaseCall { args, .. } => args.iter_mut().collect(),
            InstKind::NewObject { args, .. } => args.iter_mut().collect(),
            InstKind::FieldAccess { object, .. } => vec![object],
            InstKind::FieldStore { object, value, .. } => vec![object, value],
            InstKind::Phi { incomings } => incomings.iter_mut().map(|(v, _)| v).collect(),
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Await { value } => vec![value],
            InstKind::Yield { value } => value.iter_mut().collect(),
            InstKind::Throw { value } => value.iter_mut().collect(),
            InstKind::HandlerBind { event, handler, .. } => vec![event, handler],
            InstKind::Assign { value, .. } => vec![value],
        }
    }

    /// True when removing the instruction cannot change observable behavior
    /// (provided its result is unused).
    pub fn is_pure(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Binary { .. }
                | InstKind::Unary { .. }
                | InstKind::Compare { .. }
                | InstKind::Load { .. }
                | InstKind::Alloca { .. }
                | InstKind::GetElementPtr { .. }
                | InstKind::FieldAccess { .. }
                | InstKind::Phi { .. }
                | InstKind::Cast { .. }
        )
    }
}

/// Structural tag on a basic block. The emitter dispatches on these; the
/// diagnostic label is never consulted for control-flow reconstruction.
///
/// Loop-family tags carry the id of the loop that minted them so nested
/// loops cannot be confused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Entry,
    Plain,
    LoopHeader { loop_id: u32 },
    LoopBody { loop_id: u32 },
    LoopInc { loop_id: u32 },
    LoopEnd { loop_id: u32 },
    IfThen,
    IfElse,
    Merge,
    SwitchCase,
    SwitchDefault,
    SwitchEnd,
    TryBody,
    CatchBody,
    FinallyBody,
}

impl BlockKind {
    pub fn loop_id(&self) -> Option<u32> {
        match self {
            BlockKind::LoopHeader { loop_id }
            | BlockKind::LoopBody { loop_id }
            | BlockKind::LoopInc { loop_id }
            | BlockKind::LoopEnd { loop_id } => Some(*loop_id),
            _ => None,
        }
    }
}

/// A basic block: a label, a structural tag, an ordered instruction list,
/// and terminator-implied edges.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Diagnostic label following the canonical naming (`if.then`, ...).
    pub label: Symbol,
    pub kind: BlockKind,
    pub insts: Vec<Inst>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

impl BasicBlock {
    /// A block is terminated iff its last instruction is a branch,
    /// conditional branch, switch, or return.
    pub fn is_terminated(&self) -> bool {
        self.insts.last().map(Inst::is_terminator).unwrap_or(false)
    }

    pub fn terminator(&self) -> Option<&Inst> {
        self.insts.last().filter(|i| i.is_terminator())
    }
}

/// A named function parameter (an SSA value with version 0).
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Symbol,
    pub ty: TypeId,
}

/// A declared local, registered once per version.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: Symbol,
    pub ty: TypeId,
}

/// Function-level flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionFlags {
    pub is_async: bool,
    pub is_iterator: bool,
    pub is_extension: bool,
    pub is_external: bool,
}

/// A try/catch/finally region recorded by the builder; the CFG itself has no
/// exceptional edges, the emitter reconstructs the construct from this.
#[derive(Debug, Clone)]
pub struct TryRegion {
    pub body: BlockId,
    pub catches: Vec<CatchMeta>,
    pub finally: Option<BlockId>,
    pub end: BlockId,
}

/// One catch clause of a try region.
#[derive(Debug, Clone)]
pub struct CatchMeta {
    pub var: Option<Symbol>,
    pub ty: Option<TypeId>,
    pub block: BlockId,
}

/// An IR function: a CFG of basic blocks plus naming state.
#[derive(Clone)]
pub struct Function {
    pub name: Symbol,
    pub return_type: TypeId,
    pub params: Vec<Param>,
    pub locals: Vec<Local>,
    pub blocks: IndexVec<BlockId, BasicBlock>,
    pub entry: BlockId,
    pub flags: FunctionFlags,
    pub generic_params: Vec<Symbol>,
    pub try_regions: Vec<TryRegion>,

    /// Monotonic counter minting `__t<n>` temp names.
    pub next_temp: u32,
    /// Monotonic counter disambiguating repeated block labels.
    pub next_label: u32,
    /// Monotonic counter identifying loops for the block tags.
    pub next_loop: u32,
}

impl Function {
    pub fn new(name: Symbol, return_type: TypeId) -> Self {
        Self {
            name,
            return_type,
            params: Vec::new(),
            locals: Vec::new(),
            blocks: IndexVec::new(),
            entry: BlockId(0),
            flags: FunctionFlags::default(),
            generic_params: Vec::new(),
            try_regions: Vec::new(),
            next_temp: 0,
            next_label: 0,
            next_loop: 0,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The declared identifiers of this function: parameters and locals.
    pub fn declared_names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.params
            .iter()
            .map(|p| p.name)
            .chain(self.locals.iter().map(|l| l.name))
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("blocks", &self.block_count())
            .field("locals", &self.locals.len())
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// Field metadata on a class.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: Symbol,
    pub ty: TypeId,
    pub is_static: bool,
    pub init: Option<Value>,
}

/// Method metadata: the implementation is the named function in the module.
#[derive(Debug, Clone)]
pub struct MethodMeta {
    pub name: Symbol,
    /// Key of the implementing function in [`Module::functions`].
    pub func: Symbol,
    pub is_static: bool,
    pub is_override: bool,
}

/// Property metadata with accessor function keys.
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    pub name: Symbol,
    pub ty: TypeId,
    pub getter: Option<Symbol>,
    pub setter: Option<Symbol>,
}

/// Event metadata.
#[derive(Debug, Clone)]
pub struct EventMeta {
    pub name: Symbol,
    pub delegate: TypeId,
}

/// Class metadata.
#[derive(Debug, Clone, Default)]
pub struct ClassMeta {
    pub name: Symbol,
    pub base: Option<Symbol>,
    pub interfaces: Vec<Symbol>,
    pub generic_params: Vec<Symbol>,
    pub fields: Vec<FieldMeta>,
    pub methods: Vec<MethodMeta>,
    /// Function keys of the constructors, in declaration order.
    pub constructors: Vec<Symbol>,
    pub properties: Vec<PropertyMeta>,
    pub events: Vec<EventMeta>,
    /// Base-constructor arguments evaluated in the constructor entry block.
    pub base_ctor_args: Vec<Value>,
}

impl ClassMeta {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

/// One method signature on an interface; `default_impl` names a module
/// function used when a class does not override it.
#[derive(Debug, Clone)]
pub struct InterfaceMethodMeta {
    pub name: Symbol,
    pub params: Vec<Param>,
    pub ret: TypeId,
    pub default_impl: Option<Symbol>,
}

/// Interface metadata.
#[derive(Debug, Clone)]
pub struct InterfaceMeta {
    pub name: Symbol,
    pub methods: Vec<InterfaceMethodMeta>,
}

/// Enum metadata with resolved member values.
#[derive(Debug, Clone)]
pub struct EnumMeta {
    pub name: Symbol,
    pub underlying: TypeId,
    pub members: Vec<(Symbol, i64)>,
}

/// Delegate metadata.
#[derive(Debug, Clone)]
pub struct DelegateMeta {
    pub name: Symbol,
    pub params: Vec<Param>,
    pub ret: TypeId,
}

/// Extern declaration metadata with per-platform templates.
#[derive(Debug, Clone)]
pub struct ExternMeta {
    pub name: Symbol,
    pub is_function: bool,
    pub params: Vec<Param>,
    pub ret: Option<TypeId>,
    pub templates: Vec<(Platform, String)>,
}

/// A module-level global variable.
#[derive(Debug, Clone)]
pub struct GlobalMeta {
    pub name: Symbol,
    pub ty: TypeId,
    pub init: Option<Value>,
}

/// An IR module: the unit of compilation.
///
/// All maps are insertion-ordered; iterating a module is deterministic.
#[derive(Default)]
pub struct Module {
    pub functions: IndexMap<Symbol, Function>,
    pub globals: Vec<GlobalMeta>,
    pub classes: IndexMap<Symbol, ClassMeta>,
    pub interfaces: IndexMap<Symbol, InterfaceMeta>,
    pub enums: IndexMap<Symbol, EnumMeta>,
    pub delegates: IndexMap<Symbol, DelegateMeta>,
    pub externs: IndexMap<Symbol, ExternMeta>,
    /// User Import directives, merged into the emitted using set.
    pub imports: Vec<Symbol>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, func: Function) {
        self.functions.insert(func.name, func);
    }

    pub fn get_function(&self, name: Symbol) -> Option<&Function> {
        self.functions.get(&name)
    }

    /// Functions that are not class methods, accessors, or lambdas hoisted
    /// from one.
    pub fn free_functions(&self) -> impl Iterator<Item = &Function> {
        let method_keys: std::collections::HashSet<Symbol> = self
            .classes
            .values()
            .flat_map(|c| {
                c.methods
                    .iter()
                    .map(|m| m.func)
                    .chain(c.constructors.iter().copied())
                    .chain(
                        c.properties
                            .iter()
                            .flat_map(|p| p.getter.into_iter().chain(p.setter)),
                    )
            })
            .chain(
                self.interfaces
                    .values()
                    .flat_map(|i| i.methods.iter().filter_map(|m| m.default_impl)),
            )
            .collect();
        self.functions
            .values()
            .filter(move |f| !method_keys.contains(&f.name))
    }
}

// ----------------------------------------------------------------------------
// Textual dumps
// ----------------------------------------------------------------------------

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "func @{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "%{}", p.name)?;
        }
        writeln!(f, ") {{")?;
        for block in self.blocks.iter() {
            writeln!(f, "{}:", block.label)?;
            for inst in &block.insts {
                writeln!(f, "  {}", inst)?;
            }
        }
        write!(f, "}}")
    }
}

impl std::fmt::Display for Inst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(result) = self.result {
            write!(f, "%{} = ", result)?;
        }
        match &self.kind {
            InstKind::Binary { op, lhs, rhs } => write!(f, "{:?} {}, {}", op, lhs, rhs),
            InstKind::Unary { op, operand } => write!(f, "{:?} {}", op, operand),
            InstKind::Compare { op, lhs, rhs } => write!(f, "cmp {:?} {}, {}", op, lhs, rhs),
            InstKind::Load { addr } => write!(f, "load {}", addr),
            InstKind::Store { addr, value } => write!(f, "store {}, {}", addr, value),
            InstKind::Alloca { name } => write!(f, "alloca %{}", name),
            InstKind::GetElementPtr { base, indices } => {
                write!(f, "gep {}", base)?;
                for idx in indices {
                    write!(f, ", {}", idx)?;
                }
                Ok(())
            }
            InstKind::ArrayAlloc { dims, .. } => {
                write!(f, "arrayalloc")?;
                for d in dims {
                    write!(f, " {}", d)?;
                }
                Ok(())
            }
            InstKind::ArrayStore {
                array,
                indices,
                value,
            } => {
                write!(f, "arraystore {}", array)?;
                for idx in indices {
                    write!(f, ", {}", idx)?;
                }
                write!(f, " <- {}", value)
            }
            InstKind::Branch { target } => write!(f, "br bb{}", target.0),
            InstKind::CondBranch {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {} ? bb{} : bb{}", cond, then_block.0, else_block.0),
            InstKind::Switch {
                value,
                arms,
                default,
            } => {
                write!(f, "switch {} [", value)?;
                for arm in arms {
                    write!(f, " ")?;
                    for (i, v) in arm.values.iter().enumerate() {
                        if i > 0 {
                            write!(f, "|")?;
                        }
                        write!(f, "{}", v)?;
                    }
                    write!(f, " -> bb{}", arm.target.0)?;
                }
                write!(f, " ] default bb{}", default.0)
            }
            InstKind::Return { value: Some(v) } => write!(f, "ret {}", v),
            InstKind::Return { value: None } => write!(f, "ret void"),
            InstKind::Label { name } => write!(f, "label {}", name),
            InstKind::Call { callee, args } => {
                write!(f, "call @{}(", callee)?;
                fmt_args(f, args)?;
                write!(f, ")")
            }
            InstKind::MethodCall {
                object,
                method,
                args,
            } => {
                write!(f, "callm {}.{}(", object, method)?;
                fmt_args(f, args)?;
                write!(f, ")")
            }
            InstKind::BaseCall { method, args } => {
                write!(f, "callbase {}(", method)?;
                fmt_args(f, args)?;
                write!(f, ")")
            }
            InstKind::NewObject { args, .. } => {
                write!(f, "new(")?;
                fmt_args(f, args)?;
                write!(f, ")")
            }
            InstKind::FieldAccess { object, field } => write!(f, "field {}.{}", object, field),
            InstKind::FieldStore {
                object,
                field,
                value,
            } => write!(f, "fieldstore {}.{} <- {}", object, field, value),
            InstKind::Phi { incomings } => {
                write!(f, "phi")?;
                for (v, b) in incomings {
                    write!(f, " [{}, bb{}]", v, b.0)?;
                }
                Ok(())
            }
            InstKind::Cast { kind, value, .. } => write!(f, "cast {:?} {}", kind, value),
            InstKind::Await { value } => write!(f, "await {}", value),
            InstKind::Yield { value: Some(v) } => write!(f, "yield {}", v),
            InstKind::Yield { value: None } => write!(f, "yield break"),
            InstKind::Throw { value: Some(v) } => write!(f, "throw {}", v),
            InstKind::Throw { value: None } => write!(f, "rethrow"),
            InstKind::HandlerBind {
                event,
                handler,
                add,
            } => write!(
                f,
                "{} {}, {}",
                if *add { "addhandler" } else { "removehandler" },
                event,
                handler
            ),
            InstKind::Assign { target, value } => write!(f, "%{} := {}", target, value),
            InstKind::Comment(text) => write!(f, "; {}", text),
        }
    }
}

fn fmt_args(f: &mut std::fmt::Formatter<'_>, args: &[Value]) -> std::fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}
