//! IR optimization passes.
//!
//! Passes are independent and run in a fixed order per function, iterated to
//! a fixed point with a bounded iteration count: constant folding, copy
//! propagation, dead-code elimination. Every pass preserves terminators and
//! the predecessor/successor lists; the whole run re-verifies the CFG in
//! debug builds.

use crate::analysis::{rebuild_edges, verify_function};
use crate::ir::*;
use basc_sem::ConstValue;
use basc_util::{FxHashMap, Symbol};

/// Which passes run; the order is fixed by the pipeline regardless.
#[derive(Debug, Clone)]
pub struct OptimizeConfig {
    pub constant_folding: bool,
    pub copy_propagation: bool,
    pub dead_code: bool,
    pub max_iterations: u32,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
            copy_propagation: true,
            dead_code: true,
            max_iterations: 10,
        }
    }
}

/// Modification counts reported by an optimizer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeResult {
    pub total_modifications: usize,
    pub folded: usize,
    pub propagated: usize,
    pub removed: usize,
}

/// Optimize every function of a module in place.
pub fn optimize_module(module: &mut Module, config: &OptimizeConfig) -> OptimizeResult {
    let mut result = OptimizeResult::default();

    for func in module.functions.values_mut() {
        let before = result;
        let mut iterations = 0;
        loop {
            let mut changed = 0;
            if config.constant_folding {
                let n = fold_constants(func);
                result.folded += n;
                changed += n;
            }
            if config.copy_propagation {
                let n = propagate_copies(func);
                result.propagated += n;
                changed += n;
            }
            if config.dead_code {
                let n = eliminate_dead_code(func);
                result.removed += n;
                changed += n;
            }

            iterations += 1;
            if changed == 0 || iterations >= config.max_iterations {
                break;
            }
        }

        rebuild_edges(func);
        debug_assert!(
            verify_function(func).is_ok(),
            "optimizer broke the CFG of {}",
            func.name
        );

        let delta = (result.folded + result.propagated + result.removed)
            - (before.folded + before.propagated + before.removed);
        if delta > 0 {
            log::debug!("optimized {}: {} modifications", func.name, delta);
        }
    }

    result.total_modifications = result.folded + result.propagated + result.removed;
    result
}

// ----------------------------------------------------------------------------
// Constant folding
// ----------------------------------------------------------------------------

/// Fold Binary/Unary/Compare instructions over constant operands into plain
/// assignments of the folded constant.
fn fold_constants(func: &mut Function) -> usize {
    let mut folded = 0;
    for block in func.blocks.iter_mut() {
        for inst in &mut block.insts {
            let replacement = match &inst.kind {
                InstKind::Binary {
                    op,
                    lhs: Value::Constant(a),
                    rhs: Value::Constant(b),
                } => eval_binary(*op, a, b),
                InstKind::Unary {
                    op,
                    operand: Value::Constant(a),
                } => eval_unary(*op, a),
                InstKind::Compare {
                    op,
                    lhs: Value::Constant(a),
                    rhs: Value::Constant(b),
                } => eval_compare(*op, a, b).map(ConstValue::Bool),
                _ => None,
            };

            if let (Some(value), Some(name)) = (replacement, inst.result) {
                inst.kind = InstKind::Assign {
                    target: name,
                    value: Value::Constant(value),
                };
                inst.result = None;
                folded += 1;
            }
        }
    }
    folded
}

fn eval_binary(op: BinaryOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match (op, a, b) {
        (BinaryOp::Add, Int(x), Int(y)) => Int(x.wrapping_add(*y)),
        (BinaryOp::Sub, Int(x), Int(y)) => Int(x.wrapping_sub(*y)),
        (BinaryOp::Mul, Int(x), Int(y)) => Int(x.wrapping_mul(*y)),
        // Division by zero is left for the target to report.
        (BinaryOp::Div, Int(x), Int(y)) if *y != 0 => Int(x / y),
        (BinaryOp::IntDiv, Int(x), Int(y)) if *y != 0 => Int(x / y),
        (BinaryOp::Mod, Int(x), Int(y)) if *y != 0 => Int(x % y),
        (BinaryOp::And, Int(x), Int(y)) => Int(x & y),
        (BinaryOp::Or, Int(x), Int(y)) => Int(x | y),
        (BinaryOp::Xor, Int(x), Int(y)) => Int(x ^ y),
        (BinaryOp::Shl, Int(x), Int(y)) if (0..64).contains(y) => Int(x << y),
        (BinaryOp::Shr, Int(x), Int(y)) if (0..64).contains(y) => Int(x >> y),

        (BinaryOp::Add, Float(x), Float(y)) => Float(x + y),
        (BinaryOp::Sub, Float(x), Float(y)) => Float(x - y),
        (BinaryOp::Mul, Float(x), Float(y)) => Float(x * y),
        (BinaryOp::Div, Float(x), Float(y)) if *y != 0.0 => Float(x / y),

        (BinaryOp::And, Bool(x), Bool(y)) => Bool(*x && *y),
        (BinaryOp::Or, Bool(x), Bool(y)) => Bool(*x || *y),
        (BinaryOp::Xor, Bool(x), Bool(y)) => Bool(x != y),

        (BinaryOp::Concat, Str(x), Str(y)) => Str(format!("{}{}", x, y)),

        _ => return None,
    })
}

fn eval_unary(op: UnaryOp, a: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match (op, a) {
        (UnaryOp::Neg, Int(x)) => Int(x.wrapping_neg()),
        (UnaryOp::Neg, Float(x)) => Float(-x),
        (UnaryOp::Not, Bool(x)) => Bool(!x),
        (UnaryOp::BitwiseNot, Int(x)) => Int(!x),
        _ => return None,
    })
}

fn eval_compare(op: CompareOp, a: &ConstValue, b: &ConstValue) -> Option<bool> {
    use ConstValue::*;
    let ordering = match (a, b) {
        (Int(x), Int(y)) => x.partial_cmp(y),
        (Float(x), Float(y)) => x.partial_cmp(y),
        (Int(x), Float(y)) => (*x as f64).partial_cmp(y),
        (Float(x), Int(y)) => x.partial_cmp(&(*y as f64)),
        (Str(x), Str(y)) => x.partial_cmp(y),
        (Bool(x), Bool(y)) => x.partial_cmp(y),
        (Char(x), Char(y)) => x.partial_cmp(y),
        (Null, Null) => Some(std::cmp::Ordering::Equal),
        _ => None,
    }?;

    Some(match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => !ordering.is_eq(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
    })
}

// ----------------------------------------------------------------------------
// Copy propagation
// ----------------------------------------------------------------------------

/// Propagate single-assignment compiler temps through Assign chains.
///
/// Only temps participate; declared identifiers keep their assignments so
/// the emitted program still reads like the source.
fn propagate_copies(func: &mut Function) -> usize {
    let mut def_counts: FxHashMap<Symbol, usize> = FxHashMap::default();
    let mut copies: FxHashMap<Symbol, Value> = FxHashMap::default();

    for block in func.blocks.iter() {
        for inst in &block.insts {
            if let Some(name) = inst.result {
                *def_counts.entry(name).or_insert(0) += 1;
            }
            if let InstKind::Assign { target, .. } = &inst.kind {
                *def_counts.entry(*target).or_insert(0) += 1;
            }
        }
    }

    for block in func.blocks.iter() {
        for inst in &block.insts {
            if let InstKind::Assign { target, value } = &inst.kind {
                if is_propagatable_temp(*target)
                    && def_counts.get(target).copied().unwrap_or(0) == 1
                {
                    // Do not propagate through a value that is itself
                    // multiply assigned.
                    let source_stable = match value {
                        Value::Ref(name) => def_counts.get(name).copied().unwrap_or(0) <= 1,
                        Value::Constant(_) => true,
                    };
                    if source_stable {
                        copies.insert(*target, value.clone());
                    }
                }
            }
        }
    }

    if copies.is_empty() {
        return 0;
    }

    let mut replaced = 0;
    for block in func.blocks.iter_mut() {
        for inst in &mut block.insts {
            for operand in inst.operands_mut() {
                if let Value::Ref(name) = operand {
                    if let Some(replacement) = copies.get(name) {
                        *operand = replacement.clone();
                        replaced += 1;
                    }
                }
            }
        }
    }
    replaced
}

fn is_propagatable_temp(name: Symbol) -> bool {
    name.starts_with("__t")
}

// ----------------------------------------------------------------------------
// Dead-code elimination
// ----------------------------------------------------------------------------

/// Remove pure value-producing instructions whose result is never used, and
/// assignments to compiler temps that nothing reads (the residue copy
/// propagation leaves behind).
fn eliminate_dead_code(func: &mut Function) -> usize {
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

    let mut removed = 0;
    for block in func.blocks.iter_mut() {
        let before = block.insts.len();
        block.insts.retain(|inst| {
            let dead = match (&inst.kind, inst.result) {
                (InstKind::Assign { target, .. }, _) => {
                    is_propagatable_temp(*target)
                        && use_counts.get(target).copied().unwrap_or(0) == 0
                }
                (_, Some(name)) => {
                    inst.is_pure() && use_counts.get(&name).copied().unwrap_or(0) == 0
                }
                (_, None) => inst.is_pure(),
            };
            !dead
        });
        removed += before - block.insts.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use basc_sem::TypeTable;
    use basc_util::Span;

    fn int_const(v: i64) -> Value {
        Value::Constant(ConstValue::Int(v))
    }

    fn make_func(build: impl FnOnce(&mut FunctionBuilder, &TypeTable)) -> Function {
        let types = TypeTable::new();
        let mut b = FunctionBuilder::new(Symbol::intern("f"), types.integer());
        build(&mut b, &types);
        let mut func = b.build();
        rebuild_edges(&mut func);
        func
    }

    fn make_module(func: Function) -> Module {
        let mut module = Module::new();
        module.add_function(func);
        module
    }

    #[test]
    fn test_fold_binary_constants() {
        let func = make_func(|b, types| {
            let sum = b.emit_value(
                InstKind::Binary {
                    op: BinaryOp::Add,
                    lhs: int_const(2),
                    rhs: int_const(3),
                },
                types.integer(),
                Span::DUMMY,
            );
            b.emit_effect(
                InstKind::Return { value: Some(sum) },
                types.void(),
                Span::DUMMY,
            );
        });
        let mut module = make_module(func);

        let result = optimize_module(&mut module, &OptimizeConfig::default());
        assert!(result.folded >= 1);
        assert!(result.total_modifications >= 1);

        // The return operand is the folded constant after propagation.
        let func = module.get_function(Symbol::intern("f")).unwrap();
        let ret = func.blocks[func.entry].insts.last().unwrap();
        match &ret.kind {
            InstKind::Return { value } => assert_eq!(value, &Some(int_const(5))),
            other => panic!("expected return, found {:?}", other),
        }
    }

    #[test]
    fn test_fold_division_by_zero_untouched() {
        let func = make_func(|b, types| {
            let div = b.emit_value(
                InstKind::Binary {
                    op: BinaryOp::Div,
                    lhs: int_const(1),
                    rhs: int_const(0),
                },
                types.integer(),
                Span::DUMMY,
            );
            b.emit_effect(
                InstKind::Return { value: Some(div) },
                types.void(),
                Span::DUMMY,
            );
        });
        let mut module = make_module(func);

        let result = optimize_module(&mut module, &OptimizeConfig::default());
        assert_eq!(result.folded, 0);
    }

    #[test]
    fn test_compare_folding() {
        assert_eq!(
            eval_compare(CompareOp::Le, &ConstValue::Int(1), &ConstValue::Int(1)),
            Some(true)
        );
        assert_eq!(
            eval_compare(CompareOp::Gt, &ConstValue::Float(1.5), &ConstValue::Int(2)),
            Some(false)
        );
        assert_eq!(
            eval_compare(
                CompareOp::Eq,
                &ConstValue::Str("a".into()),
                &ConstValue::Str("a".into())
            ),
            Some(true)
        );
        assert_eq!(
            eval_compare(CompareOp::Eq, &ConstValue::Int(1), &ConstValue::Bool(true)),
            None
        );
    }

    #[test]
    fn test_dead_pure_instruction_removed() {
        let func = make_func(|b, types| {
            // Unused compare: pure, removable.
            b.emit_value(
                InstKind::Compare {
                    op: CompareOp::Lt,
                    lhs: int_const(1),
                    rhs: int_const(2),
                },
                types.boolean(),
                Span::DUMMY,
            );
            b.emit_effect(
                InstKind::Return {
                    value: Some(int_const(0)),
                },
                types.void(),
                Span::DUMMY,
            );
        });
        let mut module = make_module(func);

        let result = optimize_module(&mut module, &OptimizeConfig::default());
        assert!(result.removed >= 1);

        let func = module.get_function(Symbol::intern("f")).unwrap();
        assert_eq!(func.blocks[func.entry].insts.len(), 1);
    }

    #[test]
    fn test_calls_are_never_removed() {
        let func = make_func(|b, types| {
            // Unused call result: the call still has effects.
            b.emit_value(
                InstKind::Call {
                    callee: Symbol::intern("SideEffect"),
                    args: vec![],
                },
                types.integer(),
                Span::DUMMY,
            );
            b.emit_effect(
                InstKind::Return {
                    value: Some(int_const(0)),
                },
                types.void(),
                Span::DUMMY,
            );
        });
        let mut module = make_module(func);

        optimize_module(&mut module, &OptimizeConfig::default());
        let func = module.get_function(Symbol::intern("f")).unwrap();
        assert_eq!(func.blocks[func.entry].insts.len(), 2);
    }

    #[test]
    fn test_idempotence() {
        let func = make_func(|b, types| {
            let sum = b.emit_value(
                InstKind::Binary {
                    op: BinaryOp::Add,
                    lhs: int_const(20),
                    rhs: int_const(22),
                },
                types.integer(),
                Span::DUMMY,
            );
            let doubled = b.emit_value(
                InstKind::Binary {
                    op: BinaryOp::Mul,
                    lhs: sum,
                    rhs: int_const(2),
                },
                types.integer(),
                Span::DUMMY,
            );
            b.emit_effect(
                InstKind::Return {
                    value: Some(doubled),
                },
                types.void(),
                Span::DUMMY,
            );
        });
        let mut module = make_module(func);

        optimize_module(&mut module, &OptimizeConfig::default());
        let snapshot: Vec<String> = module
            .get_function(Symbol::intern("f"))
            .unwrap()
            .blocks
            .iter()
            .flat_map(|b| b.insts.iter().map(|i| i.to_string()))
            .collect();

        let second = optimize_module(&mut module, &OptimizeConfig::default());
        let snapshot2: Vec<String> = module
            .get_function(Symbol::intern("f"))
            .unwrap()
            .blocks
            .iter()
            .flat_map(|b| b.insts.iter().map(|i| i.to_string()))
            .collect();

        assert_eq!(snapshot, snapshot2);
        assert_eq!(second.total_modifications, 0);
    }

    #[test]
    fn test_disabled_passes_do_nothing() {
        let func = make_func(|b, types| {
            let sum = b.emit_value(
                InstKind::Binary {
                    op: BinaryOp::Add,
                    lhs: int_const(1),
                    rhs: int_const(1),
                },
                types.integer(),
                Span::DUMMY,
            );
            b.emit_effect(
                InstKind::Return { value: Some(sum) },
                types.void(),
                Span::DUMMY,
            );
        });
        let mut module = make_module(func);

        let config = OptimizeConfig {
            constant_folding: false,
            copy_propagation: false,
            dead_code: false,
            max_iterations: 10,
        };
        let result = optimize_module(&mut module, &config);
        assert_eq!(result.total_modifications, 0);
    }
}
