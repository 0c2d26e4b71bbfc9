use std::path::Path;
use std::rc::Rc;

use crate::error::Result;
use crate::symbol::SymbolTable;
use crate::value::{Closure, Value};
use crate::Symbol;

/// Nesting limit the compiler uses unless an evaluator asks for another.
pub const DEFAULT_MAX_COMPILE_DEPTH: usize = 256;

/// What the compiler and intrinsics may ask of a running engine.
///
/// Macro expansion and the `apply` intrinsic call back into the engine
/// through this trait, so the compiler never depends on the engine type.
pub trait Evaluator {
    /// Run `closure` with `args` to completion.
    fn apply(&mut self, closure: &Rc<Closure>, args: &[Value]) -> Result<Value>;

    fn lookup_global(&self, sym: &Symbol) -> Option<Value>;

    fn symbols(&mut self) -> &mut SymbolTable;

    /// Read and evaluate every form in the file at `path`.
    fn load_file(&mut self, path: &Path) -> Result<Value>;

    /// How deeply forms may nest before compilation fails with
    /// `ResourceExhausted` instead of overflowing the host stack.
    fn max_compile_depth(&self) -> usize {
        DEFAULT_MAX_COMPILE_DEPTH
    }

    fn intern(&mut self, name: &str) -> Symbol {
        self.symbols().intern(name)
    }
}
