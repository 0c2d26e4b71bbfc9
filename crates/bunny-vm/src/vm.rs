use std::path::Path;
use std::rc::Rc;

use bunny_core::{
    ArityKind, BunnyError, Closure, Environment, Evaluator, Intrinsic, Result, Symbol,
    SymbolTable, Value, DEFAULT_MAX_COMPILE_DEPTH,
};
use bunny_reader::Reader;
use tracing::{debug, trace};

use crate::compiler;
use crate::decode::InstructionReader;
use crate::opcodes::Instruction;
use crate::stack::{Slot, Stack};

/// Slots between a frame's callee and its first operand:
/// `[env][previous frame][return pc]`.
const FRAME_HEADER: usize = 3;

/// Tunables for an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Stack size at construction and after `reset`.
    pub initial_stack_slots: usize,
    /// Hard ceiling on stack growth.
    pub max_stack_slots: usize,
    /// How deeply host-level `apply` calls may nest (macro expansion,
    /// the `apply` intrinsic, `load`). Each level costs host stack, so the
    /// default leaves headroom on a 2 MiB thread.
    pub max_apply_depth: usize,
    /// How deeply forms may nest inside one compiled top-level form.
    pub max_compile_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_stack_slots: 256,
            max_stack_slots: 1 << 20,
            max_apply_depth: 64,
            max_compile_depth: DEFAULT_MAX_COMPILE_DEPTH,
        }
    }
}

/// The bytecode virtual machine.
///
/// Owns the shared stack, the global environment and the symbol table.
/// Calls between closures run on the explicit stack; only `apply` recurses
/// on the host stack.
pub struct Engine {
    stack: Stack,
    sp: usize,
    current_frame: usize,
    globals: Rc<Environment>,
    symbols: SymbolTable,
    config: EngineConfig,
    depth: usize,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            stack: Stack::new(config.initial_stack_slots),
            sp: 0,
            current_frame: 0,
            globals: Rc::new(Environment::new()),
            symbols: SymbolTable::new(),
            config,
            depth: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn globals(&self) -> &Rc<Environment> {
        &self.globals
    }

    pub fn symbol_table(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Bind `name` in the global environment.
    pub fn define_global(&mut self, name: &str, val: Value) {
        let sym = self.symbols.intern(name);
        self.globals.def(sym, val);
    }

    /// Bind an intrinsic globally under its own name.
    pub fn register(&mut self, intrinsic: Intrinsic) {
        let sym = self.symbols.intern(&intrinsic.name);
        self.globals.def(sym, Value::intrinsic(intrinsic));
    }

    pub fn lookup_global(&self, sym: &Symbol) -> Option<Value> {
        self.globals.get(sym)
    }

    /// Global lookup by name. Names never interned are never bound.
    pub fn global(&self, name: &str) -> Option<Value> {
        let sym = self.symbols.lookup(name)?;
        self.globals.get(&sym)
    }

    pub fn stack_pointer(&self) -> usize {
        self.sp
    }

    pub fn frame_pointer(&self) -> usize {
        self.current_frame
    }

    /// Discard all in-flight execution state. Globals and symbols survive.
    pub fn reset(&mut self) {
        debug!(sp = self.sp, frame = self.current_frame, "reset");
        self.stack.reset(self.config.initial_stack_slots);
        self.sp = 0;
        self.current_frame = 0;
        self.depth = 0;
    }

    pub fn compile_function(&mut self, form: &Value) -> Result<Rc<Closure>> {
        compiler::compile_function(self, form).map(Rc::new)
    }

    pub fn compile_thunk(&mut self, form: &Value) -> Result<Rc<Closure>> {
        compiler::compile_thunk(self, form).map(Rc::new)
    }

    pub fn macroexpand(&mut self, form: Value) -> Result<Value> {
        compiler::macroexpand(self, form)
    }

    /// Read, compile and run every form in `source`, returning the last
    /// value (nil for empty input).
    pub fn load_str(&mut self, source: &str) -> Result<Value> {
        let mut reader = Reader::new(source)?;
        let mut result = Value::nil();
        while let Some(form) = reader.read(&mut self.symbols)? {
            let thunk = self.compile_thunk(&form)?;
            result = self.apply(&thunk, &[])?;
        }
        Ok(result)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<Value> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| BunnyError::io(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loading file");
        self.load_str(&source)
    }

    /// Run `closure` on `args` to completion.
    ///
    /// The stack and frame pointers are restored whether or not the call
    /// succeeds, so nested applies unwind in LIFO order.
    pub fn apply(&mut self, closure: &Rc<Closure>, args: &[Value]) -> Result<Value> {
        if self.depth >= self.config.max_apply_depth {
            return Err(BunnyError::resource_exhausted(format!(
                "apply nested more than {} deep",
                self.config.max_apply_depth
            )));
        }
        let saved_sp = self.sp;
        let saved_frame = self.current_frame;
        debug!(function = %closure.name, argc = args.len(), depth = self.depth, "apply");

        self.depth += 1;
        let result = self
            .push_call(closure, args)
            .and_then(|()| self.exec(args.len()));
        self.depth -= 1;

        self.sp = saved_sp;
        self.current_frame = saved_frame;
        result
    }

    fn push_call(&mut self, closure: &Rc<Closure>, args: &[Value]) -> Result<()> {
        self.stack
            .maybe_grow(self.sp + args.len() + 1, self.config.max_stack_slots)?;
        self.push(Slot::Value(Value::Closure(closure.clone())))?;
        for arg in args {
            self.push(Slot::Value(arg.clone()))?;
        }
        Ok(())
    }

    fn push(&mut self, slot: Slot) -> Result<()> {
        self.stack.set(self.sp, slot)?;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        let top = self.below_sp(1)?;
        let val = self.stack.value(top)?.clone();
        self.sp = top;
        Ok(val)
    }

    /// Index `n` slots below the stack pointer.
    fn below_sp(&self, n: usize) -> Result<usize> {
        self.sp
            .checked_sub(n)
            .ok_or_else(|| BunnyError::invalid_state("stack underflow"))
    }

    fn frame_slot(&self, offset: usize) -> Result<usize> {
        self.current_frame
            .checked_sub(offset)
            .ok_or_else(|| BunnyError::invalid_state("no active frame"))
    }

    fn frame_env(&self) -> Result<Rc<Environment>> {
        self.stack.env(self.frame_slot(FRAME_HEADER)?)
    }

    fn symbol_at(&self, index: usize) -> Result<Symbol> {
        match self.stack.value(index)? {
            Value::Symbol(sym) => Ok(sym.clone()),
            other => Err(BunnyError::invalid_state(format!(
                "expected symbol operand, found {}",
                other.type_name()
            ))),
        }
    }

    /// Build the environment for a call: positional arguments, then any
    /// surplus as a list under the rest symbol, enclosed by the callee's
    /// captured environment.
    fn bind_arguments(&self, func: &Closure, first_arg: usize, nargs: usize) -> Result<Environment> {
        let mut bindings = Vec::with_capacity(func.n_positional + usize::from(func.variadic));
        for i in 0..func.n_positional {
            let sym = arg_symbol(func, i)?;
            bindings.push((sym, self.stack.value(first_arg + i)?.clone()));
        }
        if func.variadic {
            let sym = arg_symbol(func, func.n_positional)?;
            let rest = self
                .stack
                .values(first_arg + func.n_positional, first_arg + nargs)?;
            bindings.push((sym, Value::list(rest)));
        }
        Ok(Environment::from_bindings(bindings, func.env.clone()))
    }

    /// Environments of every frame from the current one back to (not
    /// including) `initial_frame`, innermost first.
    fn enclosing_environments(&self, initial_frame: usize) -> Result<Vec<Rc<Environment>>> {
        let mut envs = Vec::new();
        let mut frame = self.current_frame;
        while frame > initial_frame {
            envs.push(self.stack.env(frame - FRAME_HEADER)?);
            frame = self.stack.int(frame - 2)?;
        }
        Ok(envs)
    }

    fn capture_environment(&self, initial_frame: usize) -> Result<Rc<Environment>> {
        let mut envs = self.enclosing_environments(initial_frame)?.into_iter();
        let result = envs
            .next()
            .ok_or_else(|| BunnyError::invalid_state("closure created outside any frame"))?;
        let mut current = result.clone();
        for next in envs {
            current.set_next(next.clone());
            if next.has_next() {
                break;
            }
            current = next;
        }
        Ok(result)
    }

    fn exec(&mut self, nargs: usize) -> Result<Value> {
        let initial_frame = self.current_frame;
        let mut nargs = nargs;
        let mut ip = 1;

        'top: loop {
            let base = self.below_sp(nargs + 1)?;
            let mut func = self.stack.closure(base)?;

            if nargs < func.n_positional {
                return Err(BunnyError::arity(&*func.name, ArityKind::Few));
            }
            if nargs > func.n_positional && !func.variadic {
                return Err(BunnyError::arity(&*func.name, ArityKind::Many));
            }

            trace!(function = %func.name, ip, nargs, "enter");

            let mut reader = InstructionReader::at(func.code.clone(), ip)?;
            self.stack.maybe_grow(
                self.sp + FRAME_HEADER + reader.max_stack() + 1,
                self.config.max_stack_slots,
            )?;

            let env = self.bind_arguments(&func, base + 1, nargs)?;
            self.sp -= nargs;
            self.push(Slot::Env(Rc::new(env)))?;
            self.push(Slot::Int(self.current_frame))?;
            self.push(Slot::Int(0))?;
            self.current_frame = self.sp;

            loop {
                let instruction = reader.next()?;
                trace!(function = %func.name, ?instruction, sp = self.sp, "op");

                match instruction {
                    Instruction::Nop | Instruction::Dup | Instruction::Label(_) | Instruction::Halt => {
                        return Err(BunnyError::invalid_state(format!(
                            "{} is never emitted",
                            instruction.op().name()
                        )));
                    }
                    Instruction::Pop => {
                        self.sp = self.below_sp(1)?;
                    }
                    Instruction::Ret => {
                        let result = self.stack.value(self.below_sp(1)?)?.clone();
                        let previous = self.stack.int(self.frame_slot(2)?)?;
                        self.sp = self.current_frame;
                        self.current_frame = previous;
                        if self.current_frame == initial_frame {
                            trace!(function = %func.name, "return to host");
                            return Ok(result);
                        }
                        // Drop the callee's header and put the result where
                        // the callee sat.
                        self.sp = self.below_sp(FRAME_HEADER)?;
                        ip = self.stack.int(self.frame_slot(1)?)?;
                        self.stack
                            .set(self.below_sp(1)?, Slot::Value(result))?;
                        let caller = self.stack.closure(self.frame_slot(FRAME_HEADER + 1)?)?;
                        trace!(from = %func.name, to = %caller.name, ip, "return");
                        func = caller;
                        reader = InstructionReader::at(func.code.clone(), ip)?;
                    }
                    Instruction::Call(argc) => {
                        let argc = usize::from(argc);
                        let callee = self.stack.value(self.below_sp(argc + 1)?)?.clone();
                        match callee {
                            Value::Intrinsic(intrinsic) => {
                                let args = self.stack.values(self.sp - argc, self.sp)?;
                                trace!(intrinsic = %intrinsic.name, argc, "call intrinsic");
                                let result = intrinsic.call(self, &args)?;
                                self.sp -= argc;
                                self.stack
                                    .set(self.below_sp(1)?, Slot::Value(result))?;
                            }
                            Value::Closure(ref target) => {
                                trace!(from = %func.name, to = %target.name, argc, "call");
                                self.stack
                                    .set(self.frame_slot(1)?, Slot::Int(reader.position()))?;
                                nargs = argc;
                                ip = 1;
                                continue 'top;
                            }
                            other => {
                                return Err(BunnyError::type_error_with_value("function", &other));
                            }
                        }
                    }
                    Instruction::Jump(target) => {
                        reader.seek(usize::from(target))?;
                    }
                    Instruction::JumpIfNot(target) => {
                        if !self.pop()?.is_truthy() {
                            reader.seek(usize::from(target))?;
                        }
                    }
                    Instruction::Const(index) => {
                        let val = func.constants.get(usize::from(index)).cloned().ok_or_else(|| {
                            BunnyError::invalid_state(format!(
                                "constant {index} out of range in {}",
                                func.name
                            ))
                        })?;
                        self.push(Slot::Value(val))?;
                    }
                    Instruction::Load => {
                        let top = self.below_sp(1)?;
                        let sym = self.symbol_at(top)?;
                        let val = self
                            .frame_env()?
                            .get(&sym)
                            .or_else(|| self.globals.get(&sym))
                            .ok_or_else(|| BunnyError::name(&sym))?;
                        self.stack.set(top, Slot::Value(val))?;
                    }
                    Instruction::Def | Instruction::Store => {
                        let sym = self.symbol_at(self.below_sp(2)?)?;
                        let val = self.pop()?;
                        if instruction == Instruction::Def {
                            self.globals.def(sym, val.clone());
                        } else if !self.frame_env()?.set(&sym, val.clone())
                            && !self.globals.set(&sym, val.clone())
                        {
                            return Err(BunnyError::name(&sym));
                        }
                        self.stack.set(self.below_sp(1)?, Slot::Value(val))?;
                    }
                    Instruction::Closure => {
                        let top = self.below_sp(1)?;
                        let template = self.stack.closure(top)?;
                        let env = self.capture_environment(initial_frame)?;
                        self.stack
                            .set(top, Slot::Value(Value::closure(template.with_env(env))))?;
                    }
                }
            }
        }
    }
}

fn arg_symbol(func: &Closure, index: usize) -> Result<Symbol> {
    match func.constants.get(index) {
        Some(Value::Symbol(sym)) => Ok(sym.clone()),
        _ => Err(BunnyError::invalid_state(format!(
            "argument constant {index} of {} is not a symbol",
            func.name
        ))),
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for Engine {
    fn apply(&mut self, closure: &Rc<Closure>, args: &[Value]) -> Result<Value> {
        Engine::apply(self, closure, args)
    }

    fn lookup_global(&self, sym: &Symbol) -> Option<Value> {
        self.globals.get(sym)
    }

    fn symbols(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    fn load_file(&mut self, path: &Path) -> Result<Value> {
        Engine::load_file(self, path)
    }

    fn max_compile_depth(&self) -> usize {
        self.config.max_compile_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(args: &[Value], i: usize) -> Result<f64> {
        args[i].expect_number()
    }

    /// An engine with just enough intrinsics to exercise the dispatch loop.
    fn make_test_engine() -> Engine {
        let mut engine = Engine::new();
        engine.register(Intrinsic::simple("+", |args| {
            let mut sum = 0.0;
            for i in 0..args.len() {
                sum += num(args, i)?;
            }
            Ok(Value::Number(sum))
        }));
        engine.register(Intrinsic::simple("-", |args| {
            Ok(Value::Number(num(args, 0)? - num(args, 1)?))
        }));
        engine.register(Intrinsic::simple("<", |args| {
            Ok(Value::Boolean(num(args, 0)? < num(args, 1)?))
        }));
        engine.register(Intrinsic::simple("list", |args| Ok(Value::list(args.to_vec()))));
        engine.register(Intrinsic::with_evaluator("macro!", |_eval, args| {
            let c = args[0].expect_closure()?;
            c.set_macro(true);
            Ok(args[0].clone())
        }));
        engine.register(Intrinsic::with_evaluator("apply", |eval, args| {
            let c = args[0].expect_closure()?;
            let rest = args[1].expect_list()?;
            eval.apply(c, rest.as_slice())
        }));
        engine
    }

    fn eval(engine: &mut Engine, src: &str) -> Value {
        engine
            .load_str(src)
            .unwrap_or_else(|e| panic!("eval failed for `{src}`: {e}"))
    }

    fn eval_err(engine: &mut Engine, src: &str) -> BunnyError {
        let err = engine
            .load_str(src)
            .expect_err(&format!("expected error for: {src}"));
        engine.reset();
        err
    }

    #[test]
    fn test_constant() {
        let mut e = make_test_engine();
        assert_eq!(eval(&mut e, "42"), Value::Number(42.0));
        assert_eq!(eval(&mut e, "\"s\""), Value::string("s"));
    }

    #[test]
    fn test_empty_source_is_nil() {
        let mut e = make_test_engine();
        assert!(eval(&mut e, "").is_nil());
    }

    #[test]
    fn test_apply_adds() {
        let mut e = make_test_engine();
        let form = bunny_reader::read("(fn (a b) (+ a b))", e.symbol_table()).unwrap();
        let add = e.compile_function(&form).unwrap();
        let result = e
            .apply(&add, &[Value::Number(2.0), Value::Number(3.5)])
            .unwrap();
        assert_eq!(result, Value::Number(5.5));
        assert_eq!(e.stack_pointer(), 0);
        assert_eq!(e.frame_pointer(), 0);
    }

    #[test]
    fn test_arity_errors() {
        let mut e = make_test_engine();
        let form = bunny_reader::read("(fn (a) a)", e.symbol_table()).unwrap();
        let f = e.compile_function(&form).unwrap();
        assert!(matches!(
            e.apply(&f, &[]),
            Err(BunnyError::Arity { kind: ArityKind::Few, .. })
        ));
        assert!(matches!(
            e.apply(&f, &[Value::nil(), Value::nil()]),
            Err(BunnyError::Arity { kind: ArityKind::Many, .. })
        ));
        // Failed applies leave no residue.
        assert_eq!(e.stack_pointer(), 0);
        assert_eq!(e.frame_pointer(), 0);
    }

    #[test]
    fn test_rest_arguments() {
        let mut e = make_test_engine();
        let form = bunny_reader::read("(fn (n & rest) rest)", e.symbol_table()).unwrap();
        let f = e.compile_function(&form).unwrap();
        let nums: Vec<Value> = (1..=3).map(|n| Value::Number(f64::from(n))).collect();
        assert_eq!(e.apply(&f, &nums).unwrap().to_string(), "(2 3)");
        assert!(e.apply(&f, &nums[..1]).unwrap().is_nil());
    }

    #[test]
    fn test_if() {
        let mut e = make_test_engine();
        assert_eq!(eval(&mut e, "(if true 1 2)"), Value::Number(1.0));
        assert_eq!(eval(&mut e, "(if false 1 2)"), Value::Number(2.0));
        assert_eq!(eval(&mut e, "(if nil 1 2)"), Value::Number(2.0));
        assert_eq!(eval(&mut e, "(if 0 1 2)"), Value::Number(1.0));
        assert_eq!(eval(&mut e, "(if true (if false 3 4) 2)"), Value::Number(4.0));
        assert!(eval(&mut e, "(if false 1)").is_nil());
    }

    #[test]
    fn test_def_and_load() {
        let mut e = make_test_engine();
        assert_eq!(eval(&mut e, "(def x 10)"), Value::Number(10.0));
        assert_eq!(eval(&mut e, "x"), Value::Number(10.0));
        assert_eq!(e.global("x"), Some(Value::Number(10.0)));
    }

    #[test]
    fn test_set_unbound_is_name_error() {
        let mut e = make_test_engine();
        let err = eval_err(&mut e, "(set! nowhere 1)");
        assert!(matches!(err, BunnyError::Name(ref n) if n == "nowhere"));
    }

    #[test]
    fn test_load_unbound_is_name_error() {
        let mut e = make_test_engine();
        let err = eval_err(&mut e, "(+ 1 missing)");
        assert!(matches!(err, BunnyError::Name(ref n) if n == "missing"));
    }

    #[test]
    fn test_set_global() {
        let mut e = make_test_engine();
        eval(&mut e, "(def counter 0)");
        eval(&mut e, "(set! counter (+ counter 1))");
        assert_eq!(eval(&mut e, "counter"), Value::Number(1.0));
    }

    #[test]
    fn test_call_non_function_is_type_error() {
        let mut e = make_test_engine();
        let err = eval_err(&mut e, "(1 2)");
        assert!(matches!(err, BunnyError::Type { .. }));
    }

    #[test]
    fn test_closure_call_and_return() {
        let mut e = make_test_engine();
        eval(&mut e, "(def add3 (fn (a b c) (+ a b c)))");
        assert_eq!(eval(&mut e, "(add3 1 2 3)"), Value::Number(6.0));
        assert_eq!(eval(&mut e, "(+ 100 (add3 1 2 3))"), Value::Number(106.0));
    }

    #[test]
    fn test_recursion() {
        let mut e = make_test_engine();
        eval(
            &mut e,
            "(def fib (fn (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))",
        );
        assert_eq!(eval(&mut e, "(fib 15)"), Value::Number(610.0));
    }

    #[test]
    fn test_deep_recursion_grows_stack() {
        let mut e = make_test_engine();
        eval(
            &mut e,
            "(def count (fn (n) (if (< n 1) 0 (+ 1 (count (- n 1))))))",
        );
        assert_eq!(eval(&mut e, "(count 2000)"), Value::Number(2000.0));
    }

    #[test]
    fn test_stack_limit_is_resource_exhausted() {
        let mut e = Engine::with_config(EngineConfig {
            max_stack_slots: 512,
            ..EngineConfig::default()
        });
        e.register(Intrinsic::simple("+", |args| {
            Ok(Value::Number(num(args, 0)? + num(args, 1)?))
        }));
        eval(&mut e, "(def forever (fn (n) (+ 1 (forever n))))");
        let err = eval_err(&mut e, "(forever 1)");
        assert!(matches!(err, BunnyError::ResourceExhausted(_)));
        assert_eq!(e.stack_pointer(), 0);
    }

    #[test]
    fn test_closure_captures_argument() {
        let mut e = make_test_engine();
        eval(&mut e, "(def adder (fn (n) (fn (x) (+ x n))))");
        eval(&mut e, "(def add5 (adder 5))");
        assert_eq!(eval(&mut e, "(add5 10)"), Value::Number(15.0));
    }

    #[test]
    fn test_closure_mutates_captured_binding() {
        let mut e = make_test_engine();
        eval(
            &mut e,
            "(def make-counter (fn (n) (fn () (set! n (+ n 1)) n)))",
        );
        eval(&mut e, "(def c (make-counter 0))");
        eval(&mut e, "(c)");
        eval(&mut e, "(c)");
        assert_eq!(eval(&mut e, "(c)"), Value::Number(3.0));
    }

    #[test]
    fn test_closures_see_all_enclosing_scopes() {
        let mut e = make_test_engine();
        eval(
            &mut e,
            "(def f (fn (a) ((fn (b) ((fn (c) (fn () (list a b c))) 3)) 2)))",
        );
        assert_eq!(eval(&mut e, "((f 1))").to_string(), "(1 2 3)");
    }

    #[test]
    fn test_macro_expansion() {
        let mut e = make_test_engine();
        // (unless c x y) => (if c y x)
        eval(
            &mut e,
            "(def unless (macro! (fn (c x y) (list 'if c y x))))",
        );
        assert_eq!(eval(&mut e, "(unless false 1 2)"), Value::Number(1.0));
        let form = bunny_reader::read("(unless a b c)", e.symbol_table()).unwrap();
        assert_eq!(e.macroexpand(form).unwrap().to_string(), "(if a c b)");
    }

    #[test]
    fn test_one_step_macro_expands_once() {
        let mut e = make_test_engine();
        eval(&mut e, "(def expansions 0)");
        eval(
            &mut e,
            "(def twice (macro! (fn (x) (set! expansions (+ expansions 1)) (list '+ x x))))",
        );
        let form = bunny_reader::read("(twice 4)", e.symbol_table()).unwrap();
        assert_eq!(e.macroexpand(form).unwrap().to_string(), "(+ 4 4)");
        assert_eq!(e.global("expansions"), Some(Value::Number(1.0)));

        assert_eq!(eval(&mut e, "(twice 5)"), Value::Number(10.0));
        assert_eq!(e.global("expansions"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_macroexpand_non_macro_is_identical() {
        let mut e = make_test_engine();
        let form = bunny_reader::read("(+ 1 2)", e.symbol_table()).unwrap();
        assert!(e.macroexpand(form.clone()).unwrap().identical(&form));
    }

    #[test]
    fn test_reentrant_apply_restores_pointers() {
        let mut e = make_test_engine();
        eval(&mut e, "(def g (fn (x) (+ x 1)))");
        assert_eq!(
            eval(&mut e, "(+ 10 (apply g (list 1)))"),
            Value::Number(12.0)
        );
        assert_eq!(e.stack_pointer(), 0);
    }

    #[test]
    fn test_apply_depth_limit() {
        let mut e = Engine::with_config(EngineConfig {
            max_apply_depth: 8,
            ..EngineConfig::default()
        });
        e.register(Intrinsic::with_evaluator("apply", |eval, args| {
            let c = args[0].expect_closure()?;
            let rest = args[1].expect_list()?;
            eval.apply(c, rest.as_slice())
        }));
        e.register(Intrinsic::simple("list", |args| Ok(Value::list(args.to_vec()))));
        eval(&mut e, "(def loop (fn () (apply loop (list))))");
        let err = eval_err(&mut e, "(loop)");
        assert!(matches!(err, BunnyError::ResourceExhausted(_)));
    }

    /// Run `f` on a thread with the 2 MiB stack spawned threads get by default.
    fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_default_apply_depth_fits_small_stack() {
        let err = on_small_stack(|| {
            let mut e = make_test_engine();
            eval(&mut e, "(def lp (fn () (apply lp (list))))");
            eval_err(&mut e, "(lp)")
        });
        assert!(matches!(err, BunnyError::ResourceExhausted(_)));
    }

    #[test]
    fn test_deep_form_is_resource_exhausted() {
        let err = on_small_stack(|| {
            let mut e = make_test_engine();
            let depth = EngineConfig::default().max_compile_depth + 10;
            let src = format!("{}1{}", "(+ 1 ".repeat(depth), ")".repeat(depth));
            eval_err(&mut e, &src)
        });
        assert!(matches!(err, BunnyError::ResourceExhausted(_)));
    }

    #[test]
    fn test_compile_depth_from_config() {
        let mut e = Engine::with_config(EngineConfig {
            max_compile_depth: 8,
            ..EngineConfig::default()
        });
        e.register(Intrinsic::simple("+", |args| {
            Ok(Value::Number(num(args, 0)? + num(args, 1)?))
        }));
        assert_eq!(eval(&mut e, "(+ 1 (+ 1 (+ 1 1)))"), Value::Number(4.0));
        let err = eval_err(&mut e, "(+ 1 (+ 1 (+ 1 (+ 1 (+ 1 (+ 1 (+ 1 (+ 1 1))))))))");
        assert!(matches!(err, BunnyError::ResourceExhausted(_)));
    }

    #[test]
    fn test_reset_keeps_globals() {
        let mut e = make_test_engine();
        eval(&mut e, "(def kept 1)");
        let _ = eval_err(&mut e, "(1)");
        e.reset();
        assert_eq!(eval(&mut e, "kept"), Value::Number(1.0));
    }
}
