//! IR analyses.

pub mod cfg;

pub use cfg::{rebuild_edges, verify_function, CfgViolation};
