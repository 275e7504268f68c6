//! Emitter error types.

use basc_util::Symbol;
use thiserror::Error;

/// Errors raised during emission.
///
/// The emitter trusts a verified IR; anything here is either an unsupported
/// construct for the selected target mode or an internal invariant
/// violation.
#[derive(Debug, Error)]
pub enum EmitError {
    /// A construct the configured target cannot express. Reported as a
    /// structured diagnostic instead of silently emitting dead code.
    #[error("unsupported construct for this target: {0}")]
    Unsupported(String),

    /// A value name with neither a declaration nor a defining instruction.
    #[error("unresolved value `{0}` in function `{1}`")]
    UnresolvedValue(Symbol, Symbol),

    /// Invariant violation in the structured reconstruction.
    #[error("internal emitter error in `{func}`: {message}")]
    Internal { func: Symbol, message: String },
}

/// Result alias for emitter operations.
pub type Result<T> = std::result::Result<T, EmitError>;
