//! Type references as written in source.

use basc_util::Symbol;

/// A reference to a type as spelled in the source, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// The base type name (`Integer`, `List`, a class name, ...).
    pub name: Symbol,
    /// True for pointer types.
    pub is_pointer: bool,
    /// True for array types.
    pub is_array: bool,
    /// Number of array dimensions; 1 for a plain array.
    pub dimensions: u32,
    /// True for nullable types (`Integer?`).
    pub is_nullable: bool,
    /// Generic arguments (`List(Of Integer)`).
    pub generic_args: Vec<TypeRef>,
}

impl TypeRef {
    /// A plain named type with no modifiers.
    pub fn named(name: Symbol) -> Self {
        Self {
            name,
            is_pointer: false,
            is_array: false,
            dimensions: 0,
            is_nullable: false,
            generic_args: Vec::new(),
        }
    }

    /// An array of the named type with the given number of dimensions.
    pub fn array(name: Symbol, dimensions: u32) -> Self {
        Self {
            is_array: true,
            dimensions,
            ..Self::named(name)
        }
    }

    /// Mark this reference nullable.
    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    /// Attach generic arguments.
    pub fn with_generics(mut self, args: Vec<TypeRef>) -> Self {
        self.generic_args = args;
        self
    }
}
