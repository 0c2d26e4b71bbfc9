//! Bunny: a small Lisp compiled to bytecode and run on a stack machine.
//!
//! This crate ties the reader, compiler, engine and intrinsics together
//! behind an embedding API.
//!
//! # Quick Start
//!
//! ```no_run
//! use bunny::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new().unwrap();
//! let result = interp.eval_str("(+ 1 2)").unwrap();
//! assert_eq!(result, Value::Number(3.0));
//! ```

use std::path::Path;
use std::rc::Rc;

use tracing::debug;

pub use bunny_core::{BunnyError, Closure, Environment, Intrinsic, Symbol, Value};
pub use bunny_vm::{Engine, EngineConfig};

pub mod prelude;

pub type Result<T> = std::result::Result<T, BunnyError>;

/// Builder for configuring and constructing an [`Interpreter`].
///
/// By default both the intrinsics and the prelude are loaded.
pub struct InterpreterBuilder {
    stdlib: bool,
    prelude: bool,
    config: EngineConfig,
}

impl Default for InterpreterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self {
            stdlib: true,
            prelude: true,
            config: EngineConfig::default(),
        }
    }

    /// Enable or disable the intrinsic functions (default: `true`).
    pub fn with_stdlib(mut self, enable: bool) -> Self {
        self.stdlib = enable;
        self
    }

    /// Enable or disable the prelude (default: `true`). The prelude is
    /// written in terms of the intrinsics and is skipped without them.
    pub fn with_prelude(mut self, enable: bool) -> Self {
        self.prelude = enable;
        self
    }

    /// Set stack and nesting limits for the engine.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn without_stdlib(self) -> Self {
        self.with_stdlib(false)
    }

    pub fn without_prelude(self) -> Self {
        self.with_prelude(false)
    }

    /// Build the [`Interpreter`], loading the prelude if enabled.
    pub fn build(self) -> Result<Interpreter> {
        let mut engine = Engine::with_config(self.config);

        if self.stdlib {
            for intrinsic in bunny_stdlib::intrinsics() {
                engine.register(intrinsic);
            }
        }

        if self.stdlib && self.prelude {
            debug!("loading prelude");
            engine.load_str(prelude::PRELUDE)?;
            engine.reset();
        }

        Ok(Interpreter { engine })
    }
}

/// A Bunny interpreter instance.
///
/// Definitions made with `def` live in the engine's global environment and
/// persist across calls.
pub struct Interpreter {
    engine: Engine,
}

impl Interpreter {
    /// An interpreter with the intrinsics and the prelude loaded.
    pub fn new() -> Result<Self> {
        InterpreterBuilder::new().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    /// Read, compile and run every form in `input`, returning the value of
    /// the last one (nil for empty input).
    ///
    /// On error the engine's stack is reset so the next call starts clean;
    /// globals defined before the failing form are kept.
    pub fn eval_str(&mut self, input: &str) -> Result<Value> {
        let result = self.engine.load_str(input);
        if result.is_err() {
            self.engine.reset();
        }
        result
    }

    /// Compile and run an already-read form.
    pub fn eval(&mut self, form: &Value) -> Result<Value> {
        let result = self
            .engine
            .compile_thunk(form)
            .and_then(|thunk| self.engine.apply(&thunk, &[]));
        if result.is_err() {
            self.engine.reset();
        }
        result
    }

    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let result = self.engine.load_file(path.as_ref());
        if result.is_err() {
            self.engine.reset();
        }
        result
    }

    /// Read a single form, interning its symbols in this interpreter.
    pub fn read(&mut self, input: &str) -> Result<Value> {
        bunny_reader::read(input, self.engine.symbol_table())
    }

    /// Compile the single form in `input`. A `(fn ...)` form compiles to
    /// that function; anything else is wrapped in a zero-argument thunk.
    pub fn compile(&mut self, input: &str) -> Result<Rc<Closure>> {
        let form = self.read(input)?;
        let fn_sym = self.engine.intern("fn");
        let is_fn = matches!(
            form.as_list().and_then(|l| l.first()),
            Some(Value::Symbol(head)) if *head == fn_sym
        );
        if is_fn {
            self.engine.compile_function(&form)
        } else {
            self.engine.compile_thunk(&form)
        }
    }

    /// Compile `input` and return its bytecode listing.
    pub fn disassemble(&mut self, input: &str) -> Result<String> {
        let closure = self.compile(input)?;
        bunny_vm::disassemble(&closure)
    }

    /// Register a host function callable from Bunny code.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bunny::{Interpreter, Value};
    ///
    /// let mut interp = Interpreter::new().unwrap();
    /// interp.register_fn("square", |args: &[Value]| {
    ///     let n = args[0].expect_number()?;
    ///     Ok(Value::Number(n * n))
    /// });
    /// ```
    pub fn register_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        self.engine.register(Intrinsic::simple(name, f));
    }

    /// Look up a global by name.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.engine.global(name)
    }

    /// Globals that are not intrinsics, sorted by name.
    pub fn user_bindings(&self) -> Vec<(Symbol, Value)> {
        let mut bindings: Vec<_> = self
            .engine
            .globals()
            .bindings()
            .into_iter()
            .filter(|(_, v)| !matches!(v, Value::Intrinsic(_)))
            .collect();
        bindings.sort_by(|(a, _), (b, _)| a.name().cmp(b.name()));
        bindings
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}
