//! Core error types for the basc-util crate.

use thiserror::Error;

/// Error type for symbol interning operations.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// Symbol index does not name an interned string.
    #[error("symbol not found: index {index}")]
    NotFound { index: u32 },
}

/// Error type for typed index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index out of bounds for the arena it addresses.
    #[error("index out of bounds: index {index}, length {length}")]
    OutOfBounds { index: usize, length: usize },
}

/// Result alias for symbol operations.
pub type SymbolResult<T> = std::result::Result<T, SymbolError>;

/// Result alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
