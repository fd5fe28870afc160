use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// An interned quote symbol. Symbols from one table share their text allocation.
#[derive(Clone, Eq)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool { Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0 }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "'{}", self.0) }
}

/// Session-owned interning table for quote symbols.
#[derive(Default)]
pub struct SymbolTable {
    symbols: HashMap<Rc<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable { SymbolTable::default() }

    pub fn intern(&mut self, text: &str) -> Symbol {
        if let Some(symbol) = self.symbols.get(text) {
            return symbol.clone();
        }
        let shared: Rc<str> = Rc::from(text);
        let symbol = Symbol(shared.clone());
        self.symbols.insert(shared, symbol.clone());
        symbol
    }

    pub fn len(&self) -> usize { self.symbols.len() }

    pub fn is_empty(&self) -> bool { self.symbols.is_empty() }

    /// Forget every interned symbol. Values already holding symbols keep their text.
    pub fn reset(&mut self) { self.symbols.clear(); }
}
