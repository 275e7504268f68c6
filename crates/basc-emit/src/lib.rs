//! basc-emit - Structured C# emission for the basc compiler.
//!
//! The emitter walks each function's CFG exactly once and reconstructs
//! structured control flow (if/else, while, do/while, switch, break) from
//! the block-kind tags the IR builder set, while eliminating compiler
//! temporaries by inlining their defining expressions at the use sites. Only
//! declared identifiers (parameters, locals, globals) ever appear as
//! statement destinations in the output.

pub mod config;
pub mod csharp;
pub mod error;
pub mod sanitize;

pub use config::{AccessLevel, EmitterConfig, IndentStyle};
pub use csharp::CsharpEmitter;
pub use error::{EmitError, Result};
pub use sanitize::sanitize_identifier;
