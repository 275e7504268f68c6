//! String interner backing the [`Symbol`] type.
//!
//! The table maps string to index through a `DashMap` keyed with `ahash`, and
//! keeps an append-only index-to-string vector for O(1) reverse lookup.
//! Interned strings are leaked to obtain `'static` lifetime; the table lives
//! for the program duration and strings are never removed, so no lifetime
//! tracking is needed.

use dashmap::DashMap;
use std::sync::{LazyLock, RwLock};

use super::{Symbol, KNOWN_SYMBOLS};

/// Global string table, initialized on first use.
///
/// All well-known symbols are interned during initialization so that the
/// constant handles in the parent module stay valid.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    for known in KNOWN_SYMBOLS {
        table.intern(known);
    }
    table
});

/// Thread-safe string table.
pub struct StringTable {
    /// Maps interned string to its index.
    map: DashMap<&'static str, u32, ahash::RandomState>,

    /// Index-to-string reverse table, append-only.
    strings: RwLock<Vec<&'static str>>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity_and_hasher(256, ahash::RandomState::new()),
            strings: RwLock::new(Vec::with_capacity(256)),
        }
    }

    /// Intern a string, returning its symbol.
    ///
    /// The fast path is a single lock-free map lookup. On a miss the string
    /// is leaked and appended under the write lock; a concurrent insert of
    /// the same string is resolved by the map entry API, so the same string
    /// always yields the same symbol.
    pub fn intern(&self, string: &str) -> Symbol {
        if let Some(entry) = self.map.get(string) {
            return Symbol { index: *entry };
        }

        let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
        match self.map.entry(interned) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Symbol {
                index: *entry.get(),
            },
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let mut strings = self.strings.write().expect("interner poisoned");
                let index = strings.len() as u32;
                strings.push(interned);
                entry.insert(index);
                Symbol { index }
            }
        }
    }

    /// Get the string for a symbol, or `None` for an out-of-range index.
    pub fn get(&self, symbol: Symbol) -> Option<&'static str> {
        self.strings
            .read()
            .expect("interner poisoned")
            .get(symbol.index as usize)
            .copied()
    }

    /// Number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.strings.read().expect("interner poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_intern_same_string() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("hello");
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_intern_different_strings() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("world");
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_get_string() {
        let symbol = STRING_TABLE.intern("test_string");
        assert_eq!(STRING_TABLE.get(symbol), Some("test_string"));
    }

    #[test]
    fn test_known_symbols_preinterned() {
        assert!(STRING_TABLE.len() >= KNOWN_SYMBOLS.len());
        for (idx, known) in KNOWN_SYMBOLS.iter().enumerate() {
            let sym = STRING_TABLE.intern(known);
            assert_eq!(sym.index as usize, idx);
        }
    }

    #[test]
    fn test_concurrent_same_string() {
        let handles: Vec<_> = (0..10)
            .map(|_| thread::spawn(|| STRING_TABLE.intern("concurrent_same")))
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for symbol in &results[1..] {
            assert_eq!(results[0], *symbol);
        }
    }

    #[test]
    fn test_concurrent_distinct_strings() {
        let handles: Vec<_> = (0..10)
            .map(|i| thread::spawn(move || STRING_TABLE.intern(&format!("thread_{}", i))))
            .collect();

        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                assert_ne!(symbols[i], symbols[j]);
            }
        }
    }

    #[test]
    fn test_unicode_strings() {
        for test in ["你好", "🦀", "Привет"] {
            let sym = STRING_TABLE.intern(test);
            assert_eq!(STRING_TABLE.get(sym), Some(test));
        }
    }
}
