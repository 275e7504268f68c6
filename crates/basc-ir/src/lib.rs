//! basc-ir - Intermediate representation for the basc compiler.
//!
//! The IR is a three-address, basic-block form: a [`Module`] owns functions,
//! globals, and the class/interface/enum/delegate/extern metadata; a
//! [`Function`] owns a control-flow graph of [`BasicBlock`]s whose
//! instructions name their results in a lightweight SSA discipline (per-name
//! version stacks in the builder rather than dominance-based phi placement).
//!
//! Every block carries an authoritative [`BlockKind`] structural tag set by
//! the builder; the structured emitter reconstructs loops, conditionals, and
//! switches from those tags. Block labels follow the canonical `if.then` /
//! `while.cond` naming purely for diagnostics and dumps.

pub mod analysis;
pub mod builder;
#[cfg(test)]
mod edge_cases;
pub mod ir;
pub mod lower;
pub mod opt;

pub use builder::FunctionBuilder;
pub use ir::*;
pub use lower::{lower_program, LowerError, LowerOptions};
pub use opt::{optimize_module, OptimizeConfig, OptimizeResult};
