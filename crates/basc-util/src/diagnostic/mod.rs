//! Diagnostic module - error and warning reporting infrastructure.
//!
//! Every user-facing problem the pipeline finds flows through a
//! [`Diagnostic`]: a severity [`Level`], a message, a [`Span`], an optional
//! stable [`DiagnosticCode`], and attached notes and help suggestions. The
//! accumulating [`Handler`] lets the analyzer keep going after the first
//! error so one run surfaces as many problems as possible; the driver checks
//! `has_errors()` between stages and refuses to emit on errors.
//!
//! # Examples
//!
//! ```
//! use basc_util::{DiagnosticBuilder, Handler, Span};
//! use basc_util::diagnostic::codes;
//!
//! let handler = Handler::new();
//! DiagnosticBuilder::error("undefined variable `total`")
//!     .code(codes::E_UNDEFINED_SYMBOL)
//!     .span(Span::new(12, 5))
//!     .help("declare the variable before use")
//!     .emit(&handler);
//!
//! assert!(handler.has_errors());
//! ```

mod builder;
pub mod codes;

pub use builder::DiagnosticBuilder;
pub use codes::DiagnosticCode;

use crate::Span;
use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// An error that prevents emission.
    Error,
    /// A warning that does not prevent emission.
    Warning,
    /// Additional information attached to another diagnostic.
    Note,
    /// A suggestion for fixing an issue.
    Help,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
            Level::Help => write!(f, "help"),
        }
    }
}

/// A diagnostic message with severity and location.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity level.
    pub level: Level,
    /// Main message.
    pub message: String,
    /// Source location.
    pub span: Span,
    /// Optional stable code.
    pub code: Option<DiagnosticCode>,
    /// Additional notes for context.
    pub notes: Vec<String>,
    /// Help suggestions.
    pub helps: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(level: Level, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            message: message.into(),
            span,
            code: None,
            notes: Vec::new(),
            helps: Vec::new(),
        }
    }

    /// Create an error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, message, span)
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, message, span)
    }

    /// Set the diagnostic code.
    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add a help suggestion.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.helps.push(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "{}[{}]: {} ({})",
                self.level, code, self.message, self.span
            ),
            None => write!(f, "{}: {} ({})", self.level, self.message, self.span),
        }
    }
}

/// Handler for collecting and reporting diagnostics.
///
/// The handler collects diagnostics in emission order and answers count
/// queries. A panicking mode is available for tests that must not produce
/// errors.
pub struct Handler {
    /// Collected diagnostics in emission order.
    diagnostics: RefCell<Vec<Diagnostic>>,
    /// Whether to panic on errors (for tests).
    panic_on_error: bool,
}

impl Handler {
    /// Create a new handler.
    pub fn new() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: false,
        }
    }

    /// Create a handler that panics on errors (for tests).
    pub fn new_panicking() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: true,
        }
    }

    /// Emit a pre-built diagnostic.
    pub fn emit_diagnostic(&self, diagnostic: Diagnostic) {
        if self.panic_on_error && diagnostic.level == Level::Error {
            panic!("diagnostic error: {}", diagnostic.message);
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Check if any errors have been reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    /// Number of errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    /// All diagnostics in emission order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Clear all diagnostics.
    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_display() {
        assert_eq!(format!("{}", Level::Error), "error");
        assert_eq!(format!("{}", Level::Warning), "warning");
        assert_eq!(format!("{}", Level::Note), "note");
        assert_eq!(format!("{}", Level::Help), "help");
    }

    #[test]
    fn test_diagnostic_constructors() {
        let err = Diagnostic::error("bad", Span::DUMMY);
        assert_eq!(err.level, Level::Error);

        let warn = Diagnostic::warning("iffy", Span::DUMMY);
        assert_eq!(warn.level, Level::Warning);
    }

    #[test]
    fn test_diagnostic_with_code_note_help() {
        let diag = Diagnostic::error("type mismatch", Span::DUMMY)
            .with_code(codes::E_TYPE_MISMATCH)
            .with_note("expected `Integer`")
            .with_help("insert a CInt conversion");

        assert_eq!(diag.code, Some(codes::E_TYPE_MISMATCH));
        assert_eq!(diag.notes, vec!["expected `Integer`"]);
        assert_eq!(diag.helps, vec!["insert a CInt conversion"]);
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error("undefined symbol", Span::new(4, 9))
            .with_code(codes::E_UNDEFINED_SYMBOL);
        let rendered = format!("{}", diag);
        assert!(rendered.contains("error"));
        assert!(rendered.contains("undefined symbol"));
        assert!(rendered.contains("4:9"));
    }

    #[test]
    fn test_handler_counts() {
        let handler = Handler::new();
        assert!(!handler.has_errors());

        handler.emit_diagnostic(Diagnostic::error("e1", Span::DUMMY));
        handler.emit_diagnostic(Diagnostic::warning("w1", Span::DUMMY));
        handler.emit_diagnostic(Diagnostic::error("e2", Span::DUMMY));

        assert!(handler.has_errors());
        assert_eq!(handler.error_count(), 2);
        assert_eq!(handler.warning_count(), 1);
        assert_eq!(handler.diagnostics().len(), 3);
    }

    #[test]
    fn test_handler_clear() {
        let handler = Handler::new();
        handler.emit_diagnostic(Diagnostic::error("e", Span::DUMMY));
        handler.clear();
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_handler_panicking() {
        let handler = Handler::new_panicking();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler.emit_diagnostic(Diagnostic::error("boom", Span::DUMMY));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_warnings_do_not_panic() {
        let handler = Handler::new_panicking();
        handler.emit_diagnostic(Diagnostic::warning("fine", Span::DUMMY));
        assert_eq!(handler.warning_count(), 1);
    }
}
