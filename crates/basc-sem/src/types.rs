//! The type model: interned [`TypeInfo`]s and the conversion rules.
//!
//! Types are interned in a [`TypeTable`] keyed by fully-qualified name, so a
//! `TypeId` comparison is type equality: two array types get the same id iff
//! their element type and rank agree, primitives are singletons seeded at
//! table construction. All assignability, widening, and cast-kind rules live
//! on the table so the analyzer, lowerer, and emitter agree on them.

use crate::symbols::SymbolId;
use basc_util::{define_idx, IndexVec, Symbol};
use indexmap::IndexMap;

define_idx!(
    /// Handle to an interned type.
    TypeId
);

/// The built-in numeric kinds, in widening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NumericKind {
    Integer,
    Long,
    Single,
    Double,
}

impl NumericKind {
    /// Position in the widening order Integer → Long → Single → Double.
    pub fn order(self) -> u8 {
        match self {
            NumericKind::Integer => 0,
            NumericKind::Long => 1,
            NumericKind::Single => 2,
            NumericKind::Double => 3,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, NumericKind::Integer | NumericKind::Long)
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericKind::Single | NumericKind::Double)
    }
}

/// Cast kinds, derived from source/target type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Bitcast,
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    PtrToInt,
    IntToPtr,
}

/// A compile-time constant value.
///
/// Shared by the analyzer (constant declarations, enum members, Select case
/// labels) and the IR, whose `Value::Constant` carries the same
/// representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Null,
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::Str(v) => write!(f, "{:?}", v),
            ConstValue::Bool(v) => write!(f, "{}", v),
            ConstValue::Char(v) => write!(f, "{:?}", v),
            ConstValue::Null => write!(f, "null"),
        }
    }
}

/// One element of a tuple type, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleElem {
    pub name: Option<Symbol>,
    pub ty: TypeId,
}

/// Kind-specific attributes of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// The absent type of subroutines.
    Void,
    /// Built-in numeric type.
    Primitive(NumericKind),
    String,
    Boolean,
    Char,
    /// Array with element type and rank; `fixed_len` for fixed-size
    /// declarations.
    Array {
        elem: TypeId,
        rank: u32,
        fixed_len: Option<u64>,
    },
    Pointer {
        elem: TypeId,
    },
    /// Class with base, implemented interfaces, and a member table populated
    /// by semantic analysis.
    Class {
        base: Option<TypeId>,
        interfaces: Vec<TypeId>,
        members: IndexMap<Symbol, SymbolId>,
    },
    Interface {
        members: IndexMap<Symbol, SymbolId>,
    },
    Structure {
        fields: Vec<(Symbol, TypeId)>,
    },
    /// Alias introduced by a TypeDefine declaration.
    UserDefined {
        base: TypeId,
    },
    Enum {
        underlying: TypeId,
        members: IndexMap<Symbol, i64>,
    },
    Delegate {
        params: Vec<TypeId>,
        ret: TypeId,
    },
    Tuple {
        elems: Vec<TupleElem>,
    },
    Nullable {
        inner: TypeId,
    },
    /// A generic parameter in scope of a generic declaration.
    GenericParam,
    /// An instantiation of a generic type.
    GenericInstance {
        base: TypeId,
        args: Vec<TypeId>,
    },
    /// The type of the `null` literal, assignable to any reference type.
    Null,
    /// Recovery type; assignable in both directions so one error does not
    /// cascade.
    Error,
}

/// An interned type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Fully-qualified interning name.
    pub name: Symbol,
    pub kind: TypeKind,
}

/// The type interning table.
///
/// Iteration over interned types follows insertion order, which keeps every
/// downstream consumer deterministic.
pub struct TypeTable {
    types: IndexVec<TypeId, TypeInfo>,
    by_name: IndexMap<Symbol, TypeId>,

    // Singleton ids seeded at construction
    void: TypeId,
    integer: TypeId,
    long: TypeId,
    single: TypeId,
    double: TypeId,
    string: TypeId,
    boolean: TypeId,
    char: TypeId,
    object: TypeId,
    null: TypeId,
    error: TypeId,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut types = IndexVec::new();
        let mut by_name = IndexMap::new();

        let seed = |types: &mut IndexVec<TypeId, TypeInfo>,
                        by_name: &mut IndexMap<Symbol, TypeId>,
                        name: &str,
                        kind: TypeKind| {
            let name = Symbol::intern(name);
            let id = types.push(TypeInfo { name, kind });
            by_name.insert(name, id);
            id
        };

        let void = seed(&mut types, &mut by_name, "Void", TypeKind::Void);
        let integer = seed(
            &mut types,
            &mut by_name,
            "Integer",
            TypeKind::Primitive(NumericKind::Integer),
        );
        let long = seed(
            &mut types,
            &mut by_name,
            "Long",
            TypeKind::Primitive(NumericKind::Long),
        );
        let single = seed(
            &mut types,
            &mut by_name,
            "Single",
            TypeKind::Primitive(NumericKind::Single),
        );
        let double = seed(
            &mut types,
            &mut by_name,
            "Double",
            TypeKind::Primitive(NumericKind::Double),
        );
        let string = seed(&mut types, &mut by_name, "String", TypeKind::String);
        let boolean = seed(&mut types, &mut by_name, "Boolean", TypeKind::Boolean);
        let char_ty = seed(&mut types, &mut by_name, "Char", TypeKind::Char);
        let object = seed(
            &mut types,
            &mut by_name,
            "Object",
            TypeKind::Class {
                base: None,
                interfaces: Vec::new(),
                members: IndexMap::new(),
            },
        );
        let null = seed(&mut types, &mut by_name, "<null>", TypeKind::Null);
        let error = seed(&mut types, &mut by_name, "<error>", TypeKind::Error);

        Self {
            types,
            by_name,
            void,
            integer,
            long,
            single,
            double,
            string,
            boolean,
            char: char_ty,
            object,
            null,
            error,
        }
    }

    // ------------------------------------------------------------------
    // Singleton accessors
    // ------------------------------------------------------------------

    pub fn void(&self) -> TypeId {
        self.void
    }
    pub fn integer(&self) -> TypeId {
        self.integer
    }
    pub fn long(&self) -> TypeId {
        self.long
    }
    pub fn single(&self) -> TypeId {
        self.single
    }
    pub fn double(&self) -> TypeId {
        self.double
    }
    pub fn string(&self) -> TypeId {
        self.string
    }
    pub fn boolean(&self) -> TypeId {
        self.boolean
    }
    pub fn char(&self) -> TypeId {
        self.char
    }
    pub fn object(&self) -> TypeId {
        self.object
    }
    pub fn null(&self) -> TypeId {
        self.null
    }
    pub fn error(&self) -> TypeId {
        self.error
    }

    /// The primitive id for a numeric kind.
    pub fn numeric(&self, kind: NumericKind) -> TypeId {
        match kind {
            NumericKind::Integer => self.integer,
            NumericKind::Long => self.long,
            NumericKind::Single => self.single,
            NumericKind::Double => self.double,
        }
    }

    // ------------------------------------------------------------------
    // Interning
    // ------------------------------------------------------------------

    /// Intern a type under its fully-qualified name. Returns the existing id
    /// if the name is already interned.
    pub fn intern(&mut self, name: Symbol, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = self.types.push(TypeInfo { name, kind });
        self.by_name.insert(name, id);
        id
    }

    /// Look up a type by fully-qualified name.
    pub fn lookup(&self, name: Symbol) -> Option<TypeId> {
        self.by_name.get(&name).copied()
    }

    pub fn get(&self, id: TypeId) -> &TypeInfo {
        &self.types[id]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeInfo {
        &mut self.types[id]
    }

    pub fn name_of(&self, id: TypeId) -> Symbol {
        self.types[id].name
    }

    pub fn kind_of(&self, id: TypeId) -> &TypeKind {
        &self.types[id].kind
    }

    /// Iterate interned types in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeInfo)> {
        self.types.iter_enumerated()
    }

    /// Intern the array type of `elem` with the given rank.
    ///
    /// The interning name is the element name followed by a VB-style rank
    /// suffix: `Integer()`, `Integer(,)`, ...
    pub fn array_of(&mut self, elem: TypeId, rank: u32) -> TypeId {
        let commas = ",".repeat(rank.saturating_sub(1) as usize);
        let name = Symbol::intern(&format!("{}({})", self.name_of(elem), commas));
        self.intern(
            name,
            TypeKind::Array {
                elem,
                rank,
                fixed_len: None,
            },
        )
    }

    /// Intern the pointer type to `elem`.
    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        let name = Symbol::intern(&format!("{}*", self.name_of(elem)));
        self.intern(name, TypeKind::Pointer { elem })
    }

    /// Intern the nullable wrapper of `inner`.
    pub fn nullable_of(&mut self, inner: TypeId) -> TypeId {
        let name = Symbol::intern(&format!("{}?", self.name_of(inner)));
        self.intern(name, TypeKind::Nullable { inner })
    }

    /// Intern a tuple type.
    pub fn tuple_of(&mut self, elems: Vec<TupleElem>) -> TypeId {
        let parts: Vec<String> = elems
            .iter()
            .map(|e| self.name_of(e.ty).as_str().to_string())
            .collect();
        let name = Symbol::intern(&format!("({})", parts.join(", ")));
        self.intern(name, TypeKind::Tuple { elems })
    }

    /// Intern an instantiation of a generic type.
    pub fn generic_instance(&mut self, base: TypeId, args: Vec<TypeId>) -> TypeId {
        let parts: Vec<String> = args
            .iter()
            .map(|a| self.name_of(*a).as_str().to_string())
            .collect();
        let name = Symbol::intern(&format!(
            "{}(Of {})",
            self.name_of(base),
            parts.join(", ")
        ));
        self.intern(name, TypeKind::GenericInstance { base, args })
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    /// Follow UserDefined aliases to the underlying type.
    pub fn resolve_alias(&self, id: TypeId) -> TypeId {
        let mut current = id;
        loop {
            match &self.types[current].kind {
                TypeKind::UserDefined { base } => current = *base,
                _ => return current,
            }
        }
    }

    pub fn numeric_kind(&self, id: TypeId) -> Option<NumericKind> {
        match self.types[self.resolve_alias(id)].kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.numeric_kind(id).is_some()
    }

    pub fn is_integral(&self, id: TypeId) -> bool {
        match self.numeric_kind(id) {
            Some(kind) => kind.is_integral(),
            None => matches!(self.types[self.resolve_alias(id)].kind, TypeKind::Enum { .. }),
        }
    }

    pub fn is_boolean(&self, id: TypeId) -> bool {
        matches!(
            self.types[self.resolve_alias(id)].kind,
            TypeKind::Boolean | TypeKind::Error
        )
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.types[self.resolve_alias(id)].kind, TypeKind::String)
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.types[id].kind, TypeKind::Error)
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.types[self.resolve_alias(id)].kind, TypeKind::Void)
    }

    /// True for types whose values are references (and may hold null).
    pub fn is_reference(&self, id: TypeId) -> bool {
        matches!(
            self.types[self.resolve_alias(id)].kind,
            TypeKind::String
                | TypeKind::Class { .. }
                | TypeKind::Interface { .. }
                | TypeKind::Array { .. }
                | TypeKind::Delegate { .. }
                | TypeKind::Pointer { .. }
                | TypeKind::Nullable { .. }
                | TypeKind::GenericInstance { .. }
                | TypeKind::Null
        )
    }

    // ------------------------------------------------------------------
    // Conversion rules
    // ------------------------------------------------------------------

    /// The widest of two numeric types.
    pub fn common_numeric_type(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let ka = self.numeric_kind(a)?;
        let kb = self.numeric_kind(b)?;
        Some(self.numeric(if ka.order() >= kb.order() { ka } else { kb }))
    }

    /// Whether a value of `source` may be assigned to a slot of `target`.
    pub fn is_assignable_from(&self, target: TypeId, source: TypeId) -> bool {
        let target = self.resolve_alias(target);
        let source = self.resolve_alias(source);

        if target == source {
            return true;
        }
        if self.is_error(target) || self.is_error(source) {
            return true;
        }

        // Numeric widening
        if let (Some(kt), Some(ks)) = (self.numeric_kind(target), self.numeric_kind(source)) {
            return ks.order() <= kt.order();
        }

        // Null literal to any reference type
        if matches!(self.types[source].kind, TypeKind::Null) {
            return self.is_reference(target);
        }

        // Everything is an Object
        if target == self.object && !self.is_void(source) {
            return true;
        }

        // Enum to its underlying integral (with widening)
        if let TypeKind::Enum { underlying, .. } = self.types[source].kind {
            return self.is_assignable_from(target, underlying);
        }

        // T assignable to T?
        if let TypeKind::Nullable { inner } = self.types[target].kind {
            return self.is_assignable_from(inner, source);
        }

        match &self.types[source].kind {
            // Class to a transitive base class or an implemented interface
            TypeKind::Class { .. } => {
                self.is_base_of(target, source) || self.implements(source, target)
            }
            // Array covariance only for exact element-type match, which
            // interning already collapses to id equality
            TypeKind::Array { .. } => false,
            _ => false,
        }
    }

    /// Whether `base` appears in `class`'s transitive base chain.
    pub fn is_base_of(&self, base: TypeId, class: TypeId) -> bool {
        let mut current = class;
        loop {
            match &self.types[current].kind {
                TypeKind::Class {
                    base: Some(parent), ..
                } => {
                    if *parent == base {
                        return true;
                    }
                    current = *parent;
                }
                _ => return false,
            }
        }
    }

    /// Whether `class` (or a base of it) implements `interface`.
    pub fn implements(&self, class: TypeId, interface: TypeId) -> bool {
        if !matches!(self.types[interface].kind, TypeKind::Interface { .. }) {
            return false;
        }
        let mut current = class;
        loop {
            match &self.types[current].kind {
                TypeKind::Class {
                    base, interfaces, ..
                } => {
                    if interfaces.contains(&interface) {
                        return true;
                    }
                    match base {
                        Some(parent) => current = *parent,
                        None => return false,
                    }
                }
                _ => return false,
            }
        }
    }

    /// Whether two types are compatible: assignable in either direction.
    pub fn are_compatible(&self, a: TypeId, b: TypeId) -> bool {
        self.is_assignable_from(a, b) || self.is_assignable_from(b, a)
    }

    /// Derive the cast kind for an explicit conversion.
    pub fn cast_kind_for(&self, source: TypeId, target: TypeId) -> CastKind {
        let source = self.resolve_alias(source);
        let target = self.resolve_alias(target);

        match (self.numeric_kind(source), self.numeric_kind(target)) {
            (Some(s), Some(t)) => match (s.is_float(), t.is_float()) {
                (false, false) => match s.order().cmp(&t.order()) {
                    std::cmp::Ordering::Less => CastKind::SExt,
                    std::cmp::Ordering::Greater => CastKind::Trunc,
                    std::cmp::Ordering::Equal => CastKind::Bitcast,
                },
                (false, true) => CastKind::SIToFP,
                (true, false) => CastKind::FPToSI,
                (true, true) => {
                    if s.order() < t.order() {
                        CastKind::FPExt
                    } else {
                        CastKind::FPTrunc
                    }
                }
            },
            (None, Some(_)) if matches!(self.types[source].kind, TypeKind::Pointer { .. }) => {
                CastKind::PtrToInt
            }
            (Some(_), None) if matches!(self.types[target].kind, TypeKind::Pointer { .. }) => {
                CastKind::IntToPtr
            }
            _ => CastKind::Bitcast,
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_singletons() {
        let mut table = TypeTable::new();
        let again = table.intern(
            Symbol::intern("Integer"),
            TypeKind::Primitive(NumericKind::Integer),
        );
        assert_eq!(again, table.integer());
    }

    #[test]
    fn test_array_interning_by_elem_and_rank() {
        let mut table = TypeTable::new();
        let int = table.integer();
        let a1 = table.array_of(int, 1);
        let a2 = table.array_of(int, 1);
        let a3 = table.array_of(int, 2);
        let dbl = table.double();
        let a4 = table.array_of(dbl, 1);

        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
        assert_ne!(a1, a4);
        assert_eq!(table.name_of(a3).as_str(), "Integer(,)");
    }

    #[test]
    fn test_numeric_widening_order() {
        let table = TypeTable::new();
        assert!(table.is_assignable_from(table.long(), table.integer()));
        assert!(table.is_assignable_from(table.double(), table.single()));
        assert!(table.is_assignable_from(table.double(), table.integer()));
        assert!(!table.is_assignable_from(table.integer(), table.long()));
        assert!(!table.is_assignable_from(table.single(), table.double()));
    }

    #[test]
    fn test_common_numeric_type() {
        let table = TypeTable::new();
        assert_eq!(
            table.common_numeric_type(table.integer(), table.double()),
            Some(table.double())
        );
        assert_eq!(
            table.common_numeric_type(table.integer(), table.long()),
            Some(table.long())
        );
        assert_eq!(table.common_numeric_type(table.string(), table.integer()), None);
    }

    #[test]
    fn test_null_assignable_to_references_only() {
        let table = TypeTable::new();
        assert!(table.is_assignable_from(table.string(), table.null()));
        assert!(table.is_assignable_from(table.object(), table.null()));
        assert!(!table.is_assignable_from(table.integer(), table.null()));
        assert!(!table.is_assignable_from(table.boolean(), table.null()));
    }

    #[test]
    fn test_class_hierarchy_assignability() {
        let mut table = TypeTable::new();
        let animal = table.intern(
            Symbol::intern("Animal"),
            TypeKind::Class {
                base: None,
                interfaces: Vec::new(),
                members: IndexMap::new(),
            },
        );
        let dog = table.intern(
            Symbol::intern("Dog"),
            TypeKind::Class {
                base: Some(animal),
                interfaces: Vec::new(),
                members: IndexMap::new(),
            },
        );

        assert!(table.is_assignable_from(animal, dog));
        assert!(!table.is_assignable_from(dog, animal));
        assert!(table.is_assignable_from(table.object(), dog));
    }

    #[test]
    fn test_interface_assignability_through_base() {
        let mut table = TypeTable::new();
        let printable = table.intern(
            Symbol::intern("IPrintable"),
            TypeKind::Interface {
                members: IndexMap::new(),
            },
        );
        let base = table.intern(
            Symbol::intern("Widget"),
            TypeKind::Class {
                base: None,
                interfaces: vec![printable],
                members: IndexMap::new(),
            },
        );
        let derived = table.intern(
            Symbol::intern("Button"),
            TypeKind::Class {
                base: Some(base),
                interfaces: Vec::new(),
                members: IndexMap::new(),
            },
        );

        assert!(table.is_assignable_from(printable, base));
        assert!(table.is_assignable_from(printable, derived));
    }

    #[test]
    fn test_alias_resolution() {
        let mut table = TypeTable::new();
        let int = table.integer();
        let alias = table.intern(Symbol::intern("Count"), TypeKind::UserDefined { base: int });

        assert_eq!(table.resolve_alias(alias), int);
        assert!(table.is_numeric(alias));
        assert!(table.is_assignable_from(table.long(), alias));
    }

    #[test]
    fn test_cast_kinds() {
        let mut table = TypeTable::new();
        assert_eq!(
            table.cast_kind_for(table.integer(), table.long()),
            CastKind::SExt
        );
        assert_eq!(
            table.cast_kind_for(table.long(), table.integer()),
            CastKind::Trunc
        );
        assert_eq!(
            table.cast_kind_for(table.integer(), table.double()),
            CastKind::SIToFP
        );
        assert_eq!(
            table.cast_kind_for(table.double(), table.integer()),
            CastKind::FPToSI
        );
        assert_eq!(
            table.cast_kind_for(table.single(), table.double()),
            CastKind::FPExt
        );
        assert_eq!(
            table.cast_kind_for(table.double(), table.single()),
            CastKind::FPTrunc
        );
        let ptr = table.pointer_to(table.integer());
        assert_eq!(table.cast_kind_for(ptr, table.long()), CastKind::PtrToInt);
        assert_eq!(table.cast_kind_for(table.long(), ptr), CastKind::IntToPtr);
        assert_eq!(
            table.cast_kind_for(table.string(), table.object()),
            CastKind::Bitcast
        );
    }

    #[test]
    fn test_compatibility_is_bidirectional() {
        let table = TypeTable::new();
        assert!(table.are_compatible(table.integer(), table.double()));
        assert!(table.are_compatible(table.double(), table.integer()));
        assert!(!table.are_compatible(table.boolean(), table.integer()));
    }

    #[test]
    fn test_error_type_is_permissive() {
        let table = TypeTable::new();
        assert!(table.is_assignable_from(table.error(), table.integer()));
        assert!(table.is_assignable_from(table.integer(), table.error()));
    }

    #[test]
    fn test_nullable() {
        let mut table = TypeTable::new();
        let int = table.integer();
        let ni = table.nullable_of(int);
        assert_eq!(table.name_of(ni).as_str(), "Integer?");
        assert!(table.is_assignable_from(ni, int));
        assert!(table.is_assignable_from(ni, table.null()));
    }
}
