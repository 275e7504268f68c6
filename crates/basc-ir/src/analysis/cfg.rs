//! Control-flow graph maintenance and well-formedness checks.
//!
//! Edges are implied by terminators; this module recomputes the stored
//! predecessor/successor lists from them and verifies the invariants the
//! emitter relies on: every non-terminal block is terminated, and the edge
//! sets agree with the terminators in both directions.

use crate::ir::{BlockId, Function};
use basc_util::Idx;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// A well-formedness violation found by [`verify_function`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgViolation {
    #[error("block {0:?} has no terminator")]
    Unterminated(BlockId),

    #[error("block {0:?} terminator targets missing block {1:?}")]
    DanglingEdge(BlockId, BlockId),

    #[error("successor list of {0:?} disagrees with its terminator")]
    StaleSuccessors(BlockId),

    #[error("{1:?} is a successor of {0:?} but does not list it as predecessor")]
    MissingPredecessor(BlockId, BlockId),

    #[error("instruction after terminator in block {0:?}")]
    InstAfterTerminator(BlockId),
}

/// Recompute predecessor/successor lists from the terminators.
pub fn rebuild_edges(func: &mut Function) {
    let mut edges: Vec<(BlockId, Vec<BlockId>)> = Vec::new();
    for (id, block) in func.blocks.iter_enumerated() {
        let targets = block.terminator().map(|t| t.targets()).unwrap_or_default();
        edges.push((id, targets));
    }

    for block in func.blocks.iter_mut() {
        block.preds.clear();
        block.succs.clear();
    }

    for (from, targets) in edges {
        for to in targets {
            func.blocks[from].succs.push(to);
            if !func.blocks[to].preds.contains(&from) {
                func.blocks[to].preds.push(from);
            }
        }
    }
}

/// Verify the structural invariants of a function's CFG.
///
/// The last block of a function is permitted to be unterminated only when it
/// is unreachable filler; every reachable block must end in a terminator.
pub fn verify_function(func: &Function) -> Result<(), Vec<CfgViolation>> {
    let mut violations = Vec::new();
    let reachable = reachable_blocks(func);

    for (id, block) in func.blocks.iter_enumerated() {
        // No instruction may follow a terminator.
        let terminator_pos = block.insts.iter().position(|i| i.is_terminator());
        if let Some(pos) = terminator_pos {
            if pos + 1 != block.insts.len() {
                violations.push(CfgViolation::InstAfterTerminator(id));
            }
        } else if reachable.contains(&id) {
            violations.push(CfgViolation::Unterminated(id));
        }

        let targets = block.terminator().map(|t| t.targets()).unwrap_or_default();
        for target in &targets {
            if target.index() >= func.blocks.len() {
                violations.push(CfgViolation::DanglingEdge(id, *target));
            }
        }

        if block.succs != targets {
            violations.push(CfgViolation::StaleSuccessors(id));
        }

        for succ in &block.succs {
            if succ.index() < func.blocks.len() && !func.blocks[*succ].preds.contains(&id) {
                violations.push(CfgViolation::MissingPredecessor(id, *succ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// The set of blocks reachable from the entry.
pub fn reachable_blocks(func: &Function) -> HashSet<BlockId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    if func.blocks.is_empty() {
        return visited;
    }

    queue.push_back(func.entry);
    visited.insert(func.entry);

    while let Some(current) = queue.pop_front() {
        let targets = func.blocks[current]
            .terminator()
            .map(|t| t.targets())
            .unwrap_or_default();
        for target in targets {
            if target.index() < func.blocks.len() && visited.insert(target) {
                queue.push_back(target);
            }
        }
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::ir::{BlockKind, InstKind, Value};
    use basc_sem::{ConstValue, TypeTable};
    use basc_util::{Span, Symbol};

    fn sample_diamond() -> Function {
        let types = TypeTable::new();
        let mut b = FunctionBuilder::new(Symbol::intern("f"), types.void());
        let then_block = b.new_block("if.then", BlockKind::IfThen);
        let else_block = b.new_block("if.else", BlockKind::IfElse);
        let end = b.new_block("if.end", BlockKind::Merge);

        b.emit_effect(
            InstKind::CondBranch {
                cond: Value::Constant(ConstValue::Bool(true)),
                then_block,
                else_block,
            },
            types.void(),
            Span::DUMMY,
        );
        b.set_current(then_block);
        b.emit_effect(InstKind::Branch { target: end }, types.void(), Span::DUMMY);
        b.set_current(else_block);
        b.emit_effect(InstKind::Branch { target: end }, types.void(), Span::DUMMY);
        b.set_current(end);
        b.emit_effect(InstKind::Return { value: None }, types.void(), Span::DUMMY);

        let mut func = b.build();
        rebuild_edges(&mut func);
        func
    }

    #[test]
    fn test_rebuild_edges_diamond() {
        let func = sample_diamond();
        let entry = func.entry;
        assert_eq!(func.blocks[entry].succs.len(), 2);

        let end = BlockId(3);
        assert_eq!(func.blocks[end].preds.len(), 2);
    }

    #[test]
    fn test_verify_accepts_well_formed() {
        let func = sample_diamond();
        assert!(verify_function(&func).is_ok());
    }

    #[test]
    fn test_verify_rejects_unterminated_reachable_block() {
        let mut func = sample_diamond();
        // Drop the merge block's return.
        let end = BlockId(3);
        func.blocks[end].insts.clear();
        rebuild_edges(&mut func);

        let violations = verify_function(&func).unwrap_err();
        assert!(violations.contains(&CfgViolation::Unterminated(end)));
    }

    #[test]
    fn test_verify_rejects_stale_edges() {
        let mut func = sample_diamond();
        let entry = func.entry;
        func.blocks[entry].succs.clear();

        let violations = verify_function(&func).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| matches!(v, CfgViolation::StaleSuccessors(_))));
    }

    #[test]
    fn test_reachability() {
        let types = TypeTable::new();
        let mut b = FunctionBuilder::new(Symbol::intern("f"), types.void());
        let orphan = b.new_block("if.end", BlockKind::Merge);
        b.emit_effect(InstKind::Return { value: None }, types.void(), Span::DUMMY);

        let func = b.build();
        let reachable = reachable_blocks(&func);
        assert!(reachable.contains(&func.entry));
        assert!(!reachable.contains(&orphan));
    }
}
