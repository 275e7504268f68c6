//! IR function builder.
//!
//! Owns the function under construction, the per-name version stacks of the
//! lightweight SSA discipline, and the loop-context stack that Exit
//! statements branch through. Expression lowering code in [`crate::lower`]
//! drives this builder; it never touches blocks directly.

use crate::ir::*;
use basc_sem::TypeId;
use basc_util::{FxHashMap, Span, Symbol};

/// What kind of loop a context belongs to, for Exit matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCtxKind {
    For,
    Do,
    While,
}

/// One entry of the loop-context stack.
#[derive(Debug, Clone, Copy)]
pub struct LoopCtx {
    pub continue_target: BlockId,
    pub break_target: BlockId,
    pub kind: LoopCtxKind,
    pub loop_id: u32,
}

/// Builder for a single IR function.
pub struct FunctionBuilder {
    pub function: Function,
    pub current: BlockId,

    /// Stack of version names per logical variable name.
    versions: FxHashMap<Symbol, Vec<Symbol>>,
    /// Total versions ever minted per logical name.
    version_counts: FxHashMap<Symbol, u32>,
    /// Occurrences per label prefix, for diagnostic disambiguation.
    label_counts: FxHashMap<Symbol, u32>,
    /// Logical names declared per lexical scope, for popping on exit.
    scope_stack: Vec<Vec<Symbol>>,
    /// Loop contexts, innermost last.
    pub loop_stack: Vec<LoopCtx>,
}

impl FunctionBuilder {
    /// Create a builder with an `entry` block selected.
    pub fn new(name: Symbol, return_type: TypeId) -> Self {
        let mut builder = Self {
            function: Function::new(name, return_type),
            current: BlockId(0),
            versions: FxHashMap::default(),
            version_counts: FxHashMap::default(),
            label_counts: FxHashMap::default(),
            scope_stack: vec![Vec::new()],
            loop_stack: Vec::new(),
        };
        let entry = builder.new_block("entry", BlockKind::Entry);
        builder.function.entry = entry;
        builder.current = entry;
        builder
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// Create a block with a canonical label prefix and a structural tag.
    ///
    /// Repeated prefixes get a numeric suffix so dumps stay readable; the
    /// tag, not the label, is what the emitter dispatches on.
    pub fn new_block(&mut self, prefix: &str, kind: BlockKind) -> BlockId {
        let prefix_sym = Symbol::intern(prefix);
        let count = self.label_counts.entry(prefix_sym).or_insert(0);
        let label = if *count == 0 {
            prefix_sym
        } else {
            Symbol::intern(&format!("{}{}", prefix, count))
        };
        *count += 1;

        let id = self.function.blocks.next_index();
        self.function.blocks.push(BasicBlock {
            id,
            label,
            kind,
            insts: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
        });
        id
    }

    pub fn set_current(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> &BasicBlock {
        &self.function.blocks[self.current]
    }

    /// True when the current block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.current_block().is_terminated()
    }

    // ------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------

    /// Append an instruction to the current block.
    pub fn emit(&mut self, inst: Inst) {
        self.function.blocks[self.current].insts.push(inst);
    }

    /// Append a non-producing instruction.
    pub fn emit_effect(&mut self, kind: InstKind, ty: TypeId, span: Span) {
        self.emit(Inst {
            kind,
            result: None,
            ty,
            span,
        });
    }

    /// Append a value-producing instruction with a fresh temp name and
    /// return the reference to it.
    pub fn emit_value(&mut self, kind: InstKind, ty: TypeId, span: Span) -> Value {
        let name = self.fresh_temp();
        self.emit(Inst {
            kind,
            result: Some(name),
            ty,
            span,
        });
        Value::Ref(name)
    }

    /// Append a value-producing instruction named after a declared
    /// identifier (the temp-collapse form).
    pub fn emit_named(&mut self, kind: InstKind, name: Symbol, ty: TypeId, span: Span) -> Value {
        self.emit(Inst {
            kind,
            result: Some(name),
            ty,
            span,
        });
        Value::Ref(name)
    }

    /// Append a terminator unless the block already has one.
    pub fn terminate(&mut self, kind: InstKind, ty: TypeId, span: Span) {
        if !self.is_terminated() {
            self.emit_effect(kind, ty, span);
        }
    }

    /// Mint a fresh compiler-temp name.
    pub fn fresh_temp(&mut self) -> Symbol {
        let name = Symbol::intern(&format!("__t{}", self.function.next_temp));
        self.function.next_temp += 1;
        name
    }

    // ------------------------------------------------------------------
    // Variable versioning
    // ------------------------------------------------------------------

    /// Register a parameter as version 0 of its name.
    pub fn add_param(&mut self, name: Symbol, ty: TypeId) {
        self.function.params.push(Param { name, ty });
        self.versions.insert(name, vec![name]);
        self.version_counts.insert(name, 1);
    }

    /// Declare a new version of a logical variable in the innermost scope.
    ///
    /// Version 0 keeps the source name; shadowing declarations get a
    /// numbered suffix so every version has a distinct declared identifier.
    pub fn declare_local(&mut self, name: Symbol, ty: TypeId) -> Symbol {
        let count = self.version_counts.entry(name).or_insert(0);
        let versioned = if *count == 0 {
            name
        } else {
            Symbol::intern(&format!("{}_{}", name, count))
        };
        *count += 1;

        self.versions.entry(name).or_default().push(versioned);
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.push(name);
        }
        self.function.locals.push(Local {
            name: versioned,
            ty,
        });
        versioned
    }

    /// Current version of a logical name, if it is a local or parameter.
    /// Globals and class fields bypass the version stacks.
    pub fn lookup_var(&self, name: Symbol) -> Option<Symbol> {
        self.versions.get(&name).and_then(|stack| stack.last().copied())
    }

    /// Enter a lexical scope.
    pub fn push_scope(&mut self) {
        self.scope_stack.push(Vec::new());
    }

    /// Exit a lexical scope, popping every version it declared.
    pub fn pop_scope(&mut self) {
        if let Some(declared) = self.scope_stack.pop() {
            for name in declared {
                if let Some(stack) = self.versions.get_mut(&name) {
                    stack.pop();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Loop contexts
    // ------------------------------------------------------------------

    /// Mint the id tying a loop's header/body/inc/end tags together.
    pub fn next_loop_id(&mut self) -> u32 {
        let id = self.function.next_loop;
        self.function.next_loop += 1;
        id
    }

    pub fn push_loop(&mut self, ctx: LoopCtx) {
        self.loop_stack.push(ctx);
    }

    pub fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    /// Innermost loop of the given kind, for Exit lowering.
    pub fn innermost_loop(&self, kind: LoopCtxKind) -> Option<&LoopCtx> {
        self.loop_stack.iter().rev().find(|ctx| ctx.kind == kind)
    }

    /// Finish construction, returning the function.
    pub fn build(self) -> Function {
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basc_sem::TypeTable;

    #[test]
    fn test_new_builder_has_entry() {
        let types = TypeTable::new();
        let builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        assert_eq!(builder.function.block_count(), 1);
        assert_eq!(builder.current_block().kind, BlockKind::Entry);
        assert_eq!(builder.current_block().label.as_str(), "entry");
    }

    #[test]
    fn test_label_disambiguation() {
        let types = TypeTable::new();
        let mut builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        let a = builder.new_block("if.then", BlockKind::IfThen);
        let b = builder.new_block("if.then", BlockKind::IfThen);
        assert_eq!(builder.function.blocks[a].label.as_str(), "if.then");
        assert_eq!(builder.function.blocks[b].label.as_str(), "if.then1");
    }

    #[test]
    fn test_fresh_temps_are_sequential() {
        let types = TypeTable::new();
        let mut builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        assert_eq!(builder.fresh_temp().as_str(), "__t0");
        assert_eq!(builder.fresh_temp().as_str(), "__t1");
    }

    #[test]
    fn test_versioning_with_shadowing() {
        let types = TypeTable::new();
        let mut builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        let x = Symbol::intern("x");

        let v0 = builder.declare_local(x, types.integer());
        assert_eq!(v0.as_str(), "x");

        builder.push_scope();
        let v1 = builder.declare_local(x, types.integer());
        assert_eq!(v1.as_str(), "x_1");
        assert_eq!(builder.lookup_var(x), Some(v1));

        builder.pop_scope();
        assert_eq!(builder.lookup_var(x), Some(v0));
    }

    #[test]
    fn test_param_is_version_zero() {
        let types = TypeTable::new();
        let mut builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        let a = Symbol::intern("a");
        builder.add_param(a, types.integer());
        assert_eq!(builder.lookup_var(a), Some(a));
        assert_eq!(builder.function.params.len(), 1);
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let types = TypeTable::new();
        let mut builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        builder.terminate(InstKind::Return { value: None }, types.void(), Span::DUMMY);
        builder.terminate(InstKind::Return { value: None }, types.void(), Span::DUMMY);
        assert_eq!(builder.current_block().insts.len(), 1);
        assert!(builder.is_terminated());
    }

    #[test]
    fn test_loop_context_lookup() {
        let types = TypeTable::new();
        let mut builder = FunctionBuilder::new(Symbol::intern("f"), types.void());
        let cond = builder.new_block("while.cond", BlockKind::LoopHeader { loop_id: 0 });
        let end = builder.new_block("while.end", BlockKind::LoopEnd { loop_id: 0 });
        builder.push_loop(LoopCtx {
            continue_target: cond,
            break_target: end,
            kind: LoopCtxKind::While,
            loop_id: 0,
        });

        let found = builder.innermost_loop(LoopCtxKind::While).unwrap();
        assert_eq!(found.break_target, end);
        assert!(builder.innermost_loop(LoopCtxKind::For).is_none());

        builder.pop_loop();
        assert!(builder.innermost_loop(LoopCtxKind::While).is_none());
    }
}
