//! Semantic symbols.
//!
//! Every named entity the analyzer resolves gets a [`SymbolInfo`] in the
//! [`SymbolArena`]; scopes and class member tables store [`SymbolId`]
//! handles, never owned symbols, so the class / member / type graph stays
//! cycle-free.

use crate::types::{ConstValue, TypeId};
use basc_ast::{AccessLevel, Platform};
use basc_util::{define_idx, IndexVec, Span, Symbol};

define_idx!(
    /// Handle to a symbol in the arena.
    SymbolId
);

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Constant,
    Function,
    Subroutine,
    Class,
    Interface,
    Structure,
    Type,
    Enum,
    Event,
    Namespace,
    Module,
}

/// Boolean symbol attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolFlags {
    pub is_constant: bool,
    pub is_extern: bool,
    pub is_static: bool,
    /// True for the pre-registered standard-library callables.
    pub is_builtin: bool,
}

/// One resolved parameter of a callable symbol.
#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: Symbol,
    pub ty: TypeId,
    pub by_ref: bool,
}

/// A resolved named entity.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: Symbol,
    pub kind: SymbolKind,
    /// The symbol's own type (variable type, class type, delegate type, ...).
    pub ty: TypeId,
    /// Return type for callables; `None` for everything else.
    pub return_type: Option<TypeId>,
    /// Parameters for callables.
    pub params: Vec<ParamInfo>,
    pub access: AccessLevel,
    /// Per-platform implementation templates for extern symbols.
    pub extern_templates: Vec<(Platform, String)>,
    pub flags: SymbolFlags,
    /// Evaluated value for Constant symbols and enum members.
    pub const_value: Option<ConstValue>,
    pub span: Span,
}

impl SymbolInfo {
    /// A plain symbol with no callable attributes.
    pub fn new(name: Symbol, kind: SymbolKind, ty: TypeId, span: Span) -> Self {
        Self {
            name,
            kind,
            ty,
            return_type: None,
            params: Vec::new(),
            access: AccessLevel::Public,
            extern_templates: Vec::new(),
            flags: SymbolFlags::default(),
            const_value: None,
            span,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, SymbolKind::Function | SymbolKind::Subroutine)
    }

    pub fn is_type_like(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Class
                | SymbolKind::Interface
                | SymbolKind::Structure
                | SymbolKind::Type
                | SymbolKind::Enum
        )
    }
}

/// Arena owning every symbol of a compilation.
#[derive(Default)]
pub struct SymbolArena {
    symbols: IndexVec<SymbolId, SymbolInfo>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self {
            symbols: IndexVec::new(),
        }
    }

    pub fn alloc(&mut self, info: SymbolInfo) -> SymbolId {
        self.symbols.push(info)
    }

    pub fn get(&self, id: SymbolId) -> &SymbolInfo {
        &self.symbols[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolInfo {
        &mut self.symbols[id]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolInfo)> {
        self.symbols.iter_enumerated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn test_alloc_and_get() {
        let table = TypeTable::new();
        let mut arena = SymbolArena::new();

        let id = arena.alloc(SymbolInfo::new(
            Symbol::intern("counter"),
            SymbolKind::Variable,
            table.integer(),
            Span::DUMMY,
        ));

        let info = arena.get(id);
        assert_eq!(info.name.as_str(), "counter");
        assert_eq!(info.kind, SymbolKind::Variable);
        assert_eq!(info.ty, table.integer());
    }

    #[test]
    fn test_callable_predicate() {
        let table = TypeTable::new();
        let mut func = SymbolInfo::new(
            Symbol::intern("Compute"),
            SymbolKind::Function,
            table.void(),
            Span::DUMMY,
        );
        func.return_type = Some(table.integer());
        assert!(func.is_callable());

        let var = SymbolInfo::new(
            Symbol::intern("x"),
            SymbolKind::Variable,
            table.integer(),
            Span::DUMMY,
        );
        assert!(!var.is_callable());
    }

    #[test]
    fn test_flags_default_false() {
        let flags = SymbolFlags::default();
        assert!(!flags.is_constant);
        assert!(!flags.is_extern);
        assert!(!flags.is_static);
        assert!(!flags.is_builtin);
    }
}
