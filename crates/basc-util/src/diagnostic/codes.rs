//! Stable diagnostic codes.
//!
//! Codes follow `{prefix}{number}` with "E" for errors and "W" for warnings.
//! Numbering is grouped by pipeline concern: name resolution 2xxx, type
//! checking 3xxx, structural checks 4xxx, internal invariant violations 9xxx.

use std::fmt;

/// A unique code identifying a diagnostic message.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode {
    /// The prefix ("E" for error, "W" for warning).
    pub prefix: &'static str,
    /// The numeric identifier.
    pub number: u32,
}

impl DiagnosticCode {
    /// Create a new diagnostic code.
    #[inline]
    pub const fn new(prefix: &'static str, number: u32) -> Self {
        Self { prefix, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", self.prefix, self.number)
    }
}

impl fmt::Debug for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiagnosticCode({}{:04})", self.prefix, self.number)
    }
}

// ----------------------------------------------------------------------------
// Name resolution errors (2xxx)
// ----------------------------------------------------------------------------

/// Use of an identifier with no visible definition.
pub const E_UNDEFINED_SYMBOL: DiagnosticCode = DiagnosticCode::new("E", 2001);
/// Redefinition of a name in the same scope.
pub const E_DUPLICATE_DEFINITION: DiagnosticCode = DiagnosticCode::new("E", 2002);
/// Reference to an unknown type name.
pub const E_UNKNOWN_TYPE: DiagnosticCode = DiagnosticCode::new("E", 2003);

// ----------------------------------------------------------------------------
// Type errors (3xxx)
// ----------------------------------------------------------------------------

/// Assignment or return of an incompatible type.
pub const E_TYPE_MISMATCH: DiagnosticCode = DiagnosticCode::new("E", 3001);
/// Call with the wrong number of arguments.
pub const E_WRONG_ARITY: DiagnosticCode = DiagnosticCode::new("E", 3002);
/// Arithmetic on a non-numeric operand.
pub const E_NON_NUMERIC_OPERAND: DiagnosticCode = DiagnosticCode::new("E", 3003);
/// Cast between unrelated types.
pub const E_INVALID_CAST: DiagnosticCode = DiagnosticCode::new("E", 3004);
/// Array index that is not integral, or wrong index count for the rank.
pub const E_BAD_ARRAY_INDEX: DiagnosticCode = DiagnosticCode::new("E", 3005);
/// Base class reference that does not name a class.
pub const E_NON_CLASS_BASE: DiagnosticCode = DiagnosticCode::new("E", 3006);
/// Select case label that is not a compile-time constant.
pub const E_NON_CONSTANT_CASE: DiagnosticCode = DiagnosticCode::new("E", 3007);
/// String concatenation without a String operand.
pub const E_CONCAT_WITHOUT_STRING: DiagnosticCode = DiagnosticCode::new("E", 3008);

// ----------------------------------------------------------------------------
// Structural errors (4xxx)
// ----------------------------------------------------------------------------

/// Return statement outside a function or subroutine.
pub const E_RETURN_OUTSIDE_CALLABLE: DiagnosticCode = DiagnosticCode::new("E", 4001);
/// Exit statement whose kind does not match the enclosing construct.
pub const E_EXIT_KIND_MISMATCH: DiagnosticCode = DiagnosticCode::new("E", 4002);
/// MyBase used outside a derived class.
pub const E_MYBASE_OUTSIDE_DERIVED: DiagnosticCode = DiagnosticCode::new("E", 4003);
/// Yield used outside an iterator function.
pub const E_YIELD_OUTSIDE_ITERATOR: DiagnosticCode = DiagnosticCode::new("E", 4004);

// ----------------------------------------------------------------------------
// Internal errors (9xxx)
// ----------------------------------------------------------------------------

/// Invariant violation in the IR builder or emitter.
pub const E_INTERNAL: DiagnosticCode = DiagnosticCode::new("E", 9001);

// ----------------------------------------------------------------------------
// Warnings
// ----------------------------------------------------------------------------

/// Condition in a logical position is not Boolean.
pub const W_NON_BOOLEAN_CONDITION: DiagnosticCode = DiagnosticCode::new("W", 1);
/// Comparison between types with no assignability in either direction.
pub const W_INCOMPARABLE_TYPES: DiagnosticCode = DiagnosticCode::new("W", 2);
/// Collection literal with mixed element types.
pub const W_MIXED_COLLECTION: DiagnosticCode = DiagnosticCode::new("W", 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(format!("{}", E_UNDEFINED_SYMBOL), "E2001");
        assert_eq!(format!("{}", W_NON_BOOLEAN_CONDITION), "W0001");
    }

    #[test]
    fn test_code_equality() {
        assert_eq!(E_TYPE_MISMATCH, DiagnosticCode::new("E", 3001));
        assert_ne!(E_TYPE_MISMATCH, E_WRONG_ARITY);
    }
}
