//! Scope tree for name resolution.
//!
//! Scopes form a tree rooted at the Global scope. `define` fails when the
//! name already exists in the innermost scope; `resolve` walks the parent
//! chain. Bindings are insertion-ordered so everything that later iterates a
//! scope (class member tables, dumps) is deterministic.

use crate::symbols::SymbolId;
use crate::types::TypeId;
use basc_util::{define_idx, IndexVec, Symbol};
use indexmap::IndexMap;

define_idx!(
    /// Handle to a scope in the tree.
    ScopeId
);

/// Kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Module,
    Class,
    Interface,
    Function,
    Subroutine,
    Loop,
    Block,
}

/// A single scope.
#[derive(Debug)]
pub struct Scope {
    pub name: Symbol,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Name to symbol bindings, in definition order.
    pub bindings: IndexMap<Symbol, SymbolId>,
    /// Declared return type for Function scopes; `None` elsewhere and for
    /// Subroutines.
    pub return_type: Option<TypeId>,
}

/// Tree of scopes with a cursor at the scope under construction.
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    current: ScopeId,
}

impl ScopeTree {
    /// Create a tree containing only the Global scope.
    pub fn new() -> Self {
        let mut scopes = IndexVec::new();
        let root = scopes.push(Scope {
            name: Symbol::intern("<global>"),
            kind: ScopeKind::Global,
            parent: None,
            bindings: IndexMap::new(),
            return_type: None,
        });
        Self {
            scopes,
            current: root,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    /// Enter a new child scope of the current one.
    pub fn enter(&mut self, name: Symbol, kind: ScopeKind) -> ScopeId {
        let child = self.scopes.push(Scope {
            name,
            kind,
            parent: Some(self.current),
            bindings: IndexMap::new(),
            return_type: None,
        });
        self.current = child;
        child
    }

    /// Enter a callable scope carrying a return type.
    pub fn enter_callable(
        &mut self,
        name: Symbol,
        kind: ScopeKind,
        return_type: Option<TypeId>,
    ) -> ScopeId {
        let id = self.enter(name, kind);
        self.scopes[id].return_type = return_type;
        id
    }

    /// Exit to the parent scope.
    pub fn exit(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Define a name in the current scope. Fails with the existing binding
    /// when the name is already taken in this scope.
    pub fn define(&mut self, name: Symbol, symbol: SymbolId) -> Result<(), SymbolId> {
        let scope = &mut self.scopes[self.current];
        if let Some(&existing) = scope.bindings.get(&name) {
            return Err(existing);
        }
        scope.bindings.insert(name, symbol);
        Ok(())
    }

    /// Resolve a name, walking the parent chain from the current scope.
    pub fn resolve(&self, name: Symbol) -> Option<SymbolId> {
        self.resolve_from(self.current, name)
    }

    /// Resolve a name starting from a specific scope.
    pub fn resolve_from(&self, scope: ScopeId, name: Symbol) -> Option<SymbolId> {
        let mut current = scope;
        loop {
            let s = &self.scopes[current];
            if let Some(&id) = s.bindings.get(&name) {
                return Some(id);
            }
            match s.parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Resolve only in the given scope, without walking parents.
    pub fn resolve_local(&self, scope: ScopeId, name: Symbol) -> Option<SymbolId> {
        self.scopes[scope].bindings.get(&name).copied()
    }

    /// The nearest enclosing scope (including the current one) of the given
    /// kind.
    pub fn nearest(&self, kind: ScopeKind) -> Option<ScopeId> {
        let mut current = self.current;
        loop {
            let s = &self.scopes[current];
            if s.kind == kind {
                return Some(current);
            }
            match s.parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// The return type of the nearest enclosing callable scope.
    /// `None` when outside any callable; `Some(None)` inside a Subroutine.
    pub fn enclosing_return_type(&self) -> Option<Option<TypeId>> {
        let mut current = self.current;
        loop {
            let s = &self.scopes[current];
            match s.kind {
                ScopeKind::Function => return Some(s.return_type),
                ScopeKind::Subroutine => return Some(None),
                _ => {}
            }
            match s.parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{SymbolArena, SymbolInfo, SymbolKind};
    use crate::types::TypeTable;
    use basc_util::Span;

    fn sym(arena: &mut SymbolArena, table: &TypeTable, name: &str) -> SymbolId {
        arena.alloc(SymbolInfo::new(
            Symbol::intern(name),
            SymbolKind::Variable,
            table.integer(),
            Span::DUMMY,
        ))
    }

    #[test]
    fn test_define_and_resolve() {
        let table = TypeTable::new();
        let mut arena = SymbolArena::new();
        let mut tree = ScopeTree::new();

        let x = sym(&mut arena, &table, "x");
        tree.define(Symbol::intern("x"), x).unwrap();

        assert_eq!(tree.resolve(Symbol::intern("x")), Some(x));
        assert_eq!(tree.resolve(Symbol::intern("y")), None);
    }

    #[test]
    fn test_duplicate_definition_fails() {
        let table = TypeTable::new();
        let mut arena = SymbolArena::new();
        let mut tree = ScopeTree::new();

        let a = sym(&mut arena, &table, "x");
        let b = sym(&mut arena, &table, "x");
        tree.define(Symbol::intern("x"), a).unwrap();
        assert_eq!(tree.define(Symbol::intern("x"), b), Err(a));
    }

    #[test]
    fn test_shadowing_in_child_scope() {
        let table = TypeTable::new();
        let mut arena = SymbolArena::new();
        let mut tree = ScopeTree::new();

        let outer = sym(&mut arena, &table, "x");
        tree.define(Symbol::intern("x"), outer).unwrap();

        tree.enter(Symbol::intern("f"), ScopeKind::Function);
        let inner = sym(&mut arena, &table, "x");
        tree.define(Symbol::intern("x"), inner).unwrap();
        assert_eq!(tree.resolve(Symbol::intern("x")), Some(inner));

        tree.exit();
        assert_eq!(tree.resolve(Symbol::intern("x")), Some(outer));
    }

    #[test]
    fn test_parent_chain_resolution() {
        let table = TypeTable::new();
        let mut arena = SymbolArena::new();
        let mut tree = ScopeTree::new();

        let g = sym(&mut arena, &table, "global_var");
        tree.define(Symbol::intern("global_var"), g).unwrap();

        tree.enter(Symbol::intern("M"), ScopeKind::Module);
        tree.enter(Symbol::intern("f"), ScopeKind::Function);
        tree.enter(Symbol::intern("<block>"), ScopeKind::Block);

        assert_eq!(tree.resolve(Symbol::intern("global_var")), Some(g));
    }

    #[test]
    fn test_enclosing_return_type() {
        let table = TypeTable::new();
        let mut tree = ScopeTree::new();

        assert_eq!(tree.enclosing_return_type(), None);

        tree.enter_callable(
            Symbol::intern("f"),
            ScopeKind::Function,
            Some(table.integer()),
        );
        tree.enter(Symbol::intern("<loop>"), ScopeKind::Loop);
        assert_eq!(tree.enclosing_return_type(), Some(Some(table.integer())));

        tree.exit();
        tree.exit();
        tree.enter_callable(Symbol::intern("s"), ScopeKind::Subroutine, None);
        assert_eq!(tree.enclosing_return_type(), Some(None));
    }

    #[test]
    fn test_nearest() {
        let mut tree = ScopeTree::new();
        tree.enter(Symbol::intern("C"), ScopeKind::Class);
        tree.enter(Symbol::intern("f"), ScopeKind::Function);
        tree.enter(Symbol::intern("<loop>"), ScopeKind::Loop);

        assert!(tree.nearest(ScopeKind::Loop).is_some());
        assert!(tree.nearest(ScopeKind::Class).is_some());
        assert!(tree.nearest(ScopeKind::Namespace).is_none());
    }
}
