//! IR optimization passes.

mod optimize;

pub use optimize::{optimize_module, OptimizeConfig, OptimizeResult};
