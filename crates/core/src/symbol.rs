//! Symbol interning (spec §3.6).
//!
//! A symbol is an interned identifier: each spelling seen gets a small
//! integer id, and case-variant spellings (`foo`, `Foo`, `FOO`) share a
//! single *canon* id so that two words bind to the same context slot iff
//! their canon ids match.
//!
//! The table is owned by an `Interpreter` instance, not a process-wide
//! static — `relic-core` never reaches for `OnceLock`/`thread_local!` the
//! way the teacher workspace's `memory_stats.rs` registry does, because a
//! single process may host more than one interpreter instance (spec §1, §9).

use std::collections::HashMap;

/// A small integer identifying an interned spelling.
///
/// Distinct spellings that are case-variants of each other get distinct
/// `SymbolId`s but the same canon id (see [`SymbolTable::canon`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

struct SymbolEntry {
    text: Box<str>,
    canon: SymbolId,
}

/// Append-only interning table: text -> `SymbolId`, plus canon-id lookup
/// for case-insensitive binding identity.
#[derive(Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    by_text: HashMap<Box<str>, SymbolId>,
    by_canon_key: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning its `SymbolId`. Repeated calls with the same
    /// spelling return the same id. A spelling that differs from a
    /// previously-seen one only in case shares that spelling's canon id but
    /// still gets its own `SymbolId` (so exact-spelling round-tripping, e.g.
    /// for `mold`, is preserved).
    pub fn intern(&mut self, text: &str) -> SymbolId {
        if let Some(&id) = self.by_text.get(text) {
            return id;
        }

        let canon_key = text.to_lowercase();
        let id = SymbolId(self.entries.len() as u32);
        let canon = *self.by_canon_key.entry(canon_key).or_insert(id);

        self.entries.push(SymbolEntry {
            text: text.into(),
            canon,
        });
        self.by_text.insert(text.into(), id);
        id
    }

    /// Spelling text for a previously-interned id.
    ///
    /// Panics if `id` was not produced by this table — an internal
    /// invariant violation, not a recoverable script error.
    pub fn text(&self, id: SymbolId) -> &str {
        &self.entries[id.0 as usize].text
    }

    /// The canon id for `id`: the id of the first spelling seen for this
    /// identifier's case-folded form. Two words refer to the same binding
    /// target index iff `canon(a) == canon(b)`.
    pub fn canon(&self, id: SymbolId) -> SymbolId {
        self.entries[id.0 as usize].canon
    }

    /// True iff `a` and `b` name the same binding (spec §3.6).
    pub fn canon_eq(&self, a: SymbolId, b: SymbolId) -> bool {
        self.canon(a) == self.canon(b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut t = SymbolTable::new();
        let a = t.intern("foo");
        let b = t.intern("foo");
        assert_eq!(a, b);
    }

    #[test]
    fn case_variants_share_canon_but_not_id() {
        let mut t = SymbolTable::new();
        let lower = t.intern("foo");
        let upper = t.intern("FOO");
        assert_ne!(lower, upper);
        assert!(t.canon_eq(lower, upper));
        assert_eq!(t.text(lower), "foo");
        assert_eq!(t.text(upper), "FOO");
    }

    #[test]
    fn unrelated_symbols_do_not_canon_eq() {
        let mut t = SymbolTable::new();
        let a = t.intern("foo");
        let b = t.intern("bar");
        assert!(!t.canon_eq(a, b));
    }
}
