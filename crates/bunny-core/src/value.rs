use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::context::Evaluator;
use crate::error::{BunnyError, Result};
use crate::symbol::Symbol;

/// Signature shared by every intrinsic.
pub type IntrinsicFn = dyn Fn(&mut dyn Evaluator, &[Value]) -> Result<Value>;

/// A native function callable from Bunny code.
pub struct Intrinsic {
    pub name: String,
    pub func: Box<IntrinsicFn>,
}

impl Intrinsic {
    /// An intrinsic that only looks at its arguments.
    pub fn simple(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(move |_eval, args| f(args)),
        }
    }

    /// An intrinsic that needs the evaluator (symbols, globals, re-entrant apply).
    pub fn with_evaluator(
        name: impl Into<String>,
        f: impl Fn(&mut dyn Evaluator, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(f),
        }
    }

    pub fn call(&self, eval: &mut dyn Evaluator, args: &[Value]) -> Result<Value> {
        (self.func)(eval, args)
    }
}

impl fmt::Debug for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<intrinsic {}>", self.name)
    }
}

/// A compiled function, optionally bound to the environment it closes over.
pub struct Closure {
    pub name: Rc<str>,
    pub code: Rc<[u16]>,
    pub n_positional: usize,
    pub variadic: bool,
    pub constants: Rc<[Value]>,
    pub env: Option<Rc<Environment>>,
    is_macro: Cell<bool>,
}

impl Closure {
    pub fn new(
        name: impl Into<Rc<str>>,
        code: impl Into<Rc<[u16]>>,
        n_positional: usize,
        variadic: bool,
        constants: impl Into<Rc<[Value]>>,
    ) -> Self {
        Closure {
            name: name.into(),
            code: code.into(),
            n_positional,
            variadic,
            constants: constants.into(),
            env: None,
            is_macro: Cell::new(false),
        }
    }

    /// Copy of this closure bound to `env`. Code and constants are shared and
    /// the macro flag carries over.
    pub fn with_env(&self, env: Rc<Environment>) -> Self {
        Closure {
            name: self.name.clone(),
            code: self.code.clone(),
            n_positional: self.n_positional,
            variadic: self.variadic,
            constants: self.constants.clone(),
            env: Some(env),
            is_macro: Cell::new(self.is_macro.get()),
        }
    }

    pub fn is_macro(&self) -> bool {
        self.is_macro.get()
    }

    pub fn set_macro(&self, flag: bool) {
        self.is_macro.set(flag);
    }
}

impl fmt::Debug for Closure {
    // Environments can be large and deeply linked; leave them out.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("n_positional", &self.n_positional)
            .field("variadic", &self.variadic)
            .field("code", &self.code)
            .field("constants", &self.constants.len())
            .field("bound", &self.env.is_some())
            .field("is_macro", &self.is_macro.get())
            .finish()
    }
}

/// An immutable list. `List::NIL` is the one empty list.
#[derive(Clone, Default)]
pub struct List(Option<Rc<[Value]>>);

impl List {
    pub const NIL: List = List(None);

    pub fn new(items: Vec<Value>) -> Self {
        if items.is_empty() {
            List::NIL
        } else {
            List(Some(items.into()))
        }
    }

    pub fn from_slice(items: &[Value]) -> Self {
        if items.is_empty() {
            List::NIL
        } else {
            List(Some(items.into()))
        }
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_slice(&self) -> &[Value] {
        match &self.0 {
            Some(items) => items,
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_nil()
    }

    pub fn first(&self) -> Option<&Value> {
        self.as_slice().first()
    }

    /// Everything after the first element. The rest of a one-element list is nil.
    pub fn rest(&self) -> List {
        match self.as_slice() {
            [] | [_] => List::NIL,
            [_, tail @ ..] => List::from_slice(tail),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.as_slice().iter()
    }

    fn identical(&self, other: &List) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The core value type for all Bunny data.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Symbol(Symbol),
    Boolean(bool),
    String(Rc<str>),
    List(List),
    Intrinsic(Rc<Intrinsic>),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn nil() -> Value {
        Value::List(List::NIL)
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(List::new(items))
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn intrinsic(intrinsic: Intrinsic) -> Value {
        Value::Intrinsic(Rc::new(intrinsic))
    }

    pub fn closure(closure: Closure) -> Value {
        Value::Closure(Rc::new(closure))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Symbol(_) => "symbol",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Intrinsic(_) => "intrinsic",
            Value::Closure(_) => "closure",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(l) if l.is_nil())
    }

    /// Only nil and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false)) && !self.is_nil()
    }

    /// Identity comparison. Numbers and booleans are immediates and compare by
    /// bit pattern; everything else compares by allocation.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => a.identical(b),
            (Value::Intrinsic(a), Value::Intrinsic(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Rc<Closure>> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn expect_number(&self) -> Result<f64> {
        self.as_number()
            .ok_or_else(|| BunnyError::type_error_with_value("number", self))
    }

    pub fn expect_symbol(&self) -> Result<&Symbol> {
        self.as_symbol()
            .ok_or_else(|| BunnyError::type_error_with_value("symbol", self))
    }

    pub fn expect_list(&self) -> Result<&List> {
        self.as_list()
            .ok_or_else(|| BunnyError::type_error_with_value("list", self))
    }

    pub fn expect_closure(&self) -> Result<&Rc<Closure>> {
        self.as_closure()
            .ok_or_else(|| BunnyError::type_error_with_value("closure", self))
    }
}

/// Structural equality: numbers, strings, booleans and lists compare by
/// content, everything else by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.as_slice() == b.as_slice(),
            _ => self.identical(other),
        }
    }
}

fn format_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => format_number(f, *n),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::List(l) => {
                write!(f, "(")?;
                for (i, item) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Intrinsic(i) => write!(f, "#<intrinsic {}>", i.name),
            Value::Closure(c) => write!(f, "#<closure {}>", c.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// A scope: bindings plus an optional link to the enclosing scope.
#[derive(Default)]
pub struct Environment {
    bindings: RefCell<HashMap<Symbol, Value>>,
    next: RefCell<Option<Rc<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn with_next(next: Option<Rc<Environment>>) -> Self {
        Environment {
            bindings: RefCell::new(HashMap::new()),
            next: RefCell::new(next),
        }
    }

    pub fn from_bindings(
        bindings: impl IntoIterator<Item = (Symbol, Value)>,
        next: Option<Rc<Environment>>,
    ) -> Self {
        Environment {
            bindings: RefCell::new(bindings.into_iter().collect()),
            next: RefCell::new(next),
        }
    }

    /// Bind in this scope only, replacing any existing binding.
    pub fn def(&self, sym: Symbol, val: Value) {
        self.bindings.borrow_mut().insert(sym, val);
    }

    /// Look `sym` up, innermost scope first.
    pub fn get(&self, sym: &Symbol) -> Option<Value> {
        if let Some(val) = self.bindings.borrow().get(sym) {
            return Some(val.clone());
        }
        let mut env = self.next();
        while let Some(e) = env {
            if let Some(val) = e.bindings.borrow().get(sym) {
                return Some(val.clone());
            }
            env = e.next();
        }
        None
    }

    /// Overwrite the nearest existing binding of `sym`. Returns false when no
    /// scope in the chain binds it.
    pub fn set(&self, sym: &Symbol, val: Value) -> bool {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(sym) {
            *slot = val;
            return true;
        }
        let mut env = self.next();
        while let Some(e) = env {
            if let Some(slot) = e.bindings.borrow_mut().get_mut(sym) {
                *slot = val;
                return true;
            }
            env = e.next();
        }
        false
    }

    pub fn contains(&self, sym: &Symbol) -> bool {
        self.bindings.borrow().contains_key(sym)
    }

    pub fn next(&self) -> Option<Rc<Environment>> {
        self.next.borrow().clone()
    }

    pub fn has_next(&self) -> bool {
        self.next.borrow().is_some()
    }

    pub fn set_next(&self, next: Rc<Environment>) {
        *self.next.borrow_mut() = Some(next);
    }

    /// Snapshot of this scope's own bindings.
    pub fn bindings(&self) -> Vec<(Symbol, Value)> {
        self.bindings
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.bindings.borrow().len())
            .field("has_next", &self.has_next())
            .finish()
    }
}
