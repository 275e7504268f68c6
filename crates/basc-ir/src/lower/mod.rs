//! AST to IR lowering.

mod ast_to_ir;

pub use ast_to_ir::{fold_definitions_into_assignments, lower_program, LowerError, LowerOptions};
