//! Per-run emitter configuration.

/// Access level applied to emitted members and classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Public,
    Private,
    Protected,
    Internal,
}

impl AccessLevel {
    pub fn keyword(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
            AccessLevel::Protected => "protected",
            AccessLevel::Internal => "internal",
        }
    }
}

/// Tabs or spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Spaces,
    Tabs,
}

/// Configuration for one emission run.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Namespace wrapping the output.
    pub namespace: String,
    /// Class receiving globals and free functions.
    pub class_name: String,
    /// Synthesize a `Main` entry point when the module has none.
    pub synthesize_main: bool,
    /// Emit IR comment instructions as source comments.
    pub emit_comments: bool,
    /// Access level for emitted methods.
    pub method_access: AccessLevel,
    /// Access level for the emitted class.
    pub class_access: AccessLevel,
    /// Indentation width in characters.
    pub indent_width: usize,
    /// Tabs vs spaces.
    pub indent_style: IndentStyle,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            namespace: "Transpiled".to_string(),
            class_name: "Program".to_string(),
            synthesize_main: false,
            emit_comments: false,
            method_access: AccessLevel::Public,
            class_access: AccessLevel::Public,
            indent_width: 4,
            indent_style: IndentStyle::Spaces,
        }
    }
}

impl EmitterConfig {
    /// One level of indentation.
    pub fn indent_unit(&self) -> String {
        match self.indent_style {
            IndentStyle::Spaces => " ".repeat(self.indent_width),
            IndentStyle::Tabs => "\t".to_string(),
        }
    }
}
