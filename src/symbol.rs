//! Interned identifiers.
//!
//! Every [`Ast`](crate::ast::Ast) owns exactly one [`StringInterner`], so two
//! [`Symbol`] values are only comparable when they come from the same tree.

use string_interner::{self, backend, symbol};

/// The initial capacity of a [`StringInterner`].
///
/// [`string_interner`] multiplies this value by 5 when it sizes its string
/// buffer, assuming an average identifier is 5 bytes long.
const INTERNER_CAPACITY: usize = 256;

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Symbol(symbol::SymbolU32);

#[derive(Debug, Clone)]
pub struct StringInterner(
    string_interner::StringInterner<backend::StringBackend<symbol::SymbolU32>>,
);

impl StringInterner {
    pub fn new() -> Self {
        StringInterner(string_interner::StringInterner::with_capacity(
            INTERNER_CAPACITY,
        ))
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        Symbol(self.0.get_or_intern(s))
    }

    /// Returns the symbol for `s` without interning it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.0.get(s).map(Symbol)
    }

    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.0.resolve(sym.0)
    }

    /// Like [`StringInterner::resolve`], but falls back to a placeholder for
    /// symbols from another interner. Used when rendering diagnostics.
    pub fn display(&self, sym: Symbol) -> &str {
        self.resolve(sym).unwrap_or("<?>")
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
