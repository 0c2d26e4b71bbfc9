use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use lasso::{Key, Rodeo};

/// A symbol compared by identity.
///
/// Two symbols are equal only when they are the same allocation. Symbols
/// obtained from a [`SymbolTable`] are canonical per name; symbols made by
/// [`SymbolTable::gensym`] never equal any other symbol.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    fn fresh(name: &str) -> Self {
        Symbol(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", &*self.0)
    }
}

/// Per-engine intern table.
pub struct SymbolTable {
    rodeo: Rodeo,
    canonical: Vec<Symbol>,
    gensym_counter: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            rodeo: Rodeo::default(),
            canonical: Vec::new(),
            gensym_counter: 0,
        }
    }

    /// Return the canonical symbol for `name`, creating it on first use.
    pub fn intern(&mut self, name: &str) -> Symbol {
        let key = self.rodeo.get_or_intern(name);
        let idx = key.into_usize();
        if idx == self.canonical.len() {
            self.canonical.push(Symbol::fresh(name));
        }
        self.canonical[idx].clone()
    }

    /// Canonical symbol for `name` if it has been interned.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        let key = self.rodeo.get(name)?;
        self.canonical.get(key.into_usize()).cloned()
    }

    /// A fresh symbol that is not in the table and so can never collide with
    /// a symbol read from source.
    pub fn gensym(&mut self, prefix: &str) -> Symbol {
        let n = self.gensym_counter;
        self.gensym_counter = self.gensym_counter.wrapping_add(1);
        Symbol::fresh(&format!("{prefix}-{n:04x}"))
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
