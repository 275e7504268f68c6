//! Identifier sanitation for the C# target.
//!
//! The contract: the output of [`sanitize_identifier`] is a syntactically
//! valid C# identifier. Characters other than letters, digits, and
//! underscores are stripped, a leading digit gets an underscore prefix, and
//! reserved words take the C# verbatim-identifier escape.

/// C# reserved words, sorted for the binary search below.
const RESERVED: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Whether a name collides with a C# reserved word.
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED.binary_search(&name).is_ok()
}

/// Sanitize an arbitrary source identifier into a valid C# identifier.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if out.is_empty() {
        out.push('_');
    }
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        out.insert(0, '_');
    }
    if is_reserved_word(&out) {
        out.insert(0, '@');
    }
    out
}

/// Sanitize a possibly dotted name (`Class.Method`) segment by segment.
pub fn sanitize_dotted(name: &str) -> String {
    name.split('.')
        .map(sanitize_identifier)
        .collect::<Vec<_>>()
        .join(".")
}
