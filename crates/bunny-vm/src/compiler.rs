use std::rc::Rc;

use bunny_core::{BunnyError, Closure, Evaluator, Result, Symbol, SymbolTable, Value};
use tracing::trace;

use crate::opcodes::Instruction;
use crate::writer::BytecodeWriter;

/// The interned symbols the compiler treats specially.
pub struct SpecialForms {
    pub fn_: Symbol,
    pub quote: Symbol,
    pub if_: Symbol,
    pub def: Symbol,
    pub set: Symbol,
    pub rest_marker: Symbol,
}

impl SpecialForms {
    pub fn new(symbols: &mut SymbolTable) -> Self {
        SpecialForms {
            fn_: symbols.intern("fn"),
            quote: symbols.intern("quote"),
            if_: symbols.intern("if"),
            def: symbols.intern("def"),
            set: symbols.intern("set!"),
            rest_marker: symbols.intern("&"),
        }
    }

    pub fn is_special(&self, sym: &Symbol) -> bool {
        *sym == self.fn_
            || *sym == self.quote
            || *sym == self.if_
            || *sym == self.def
            || *sym == self.set
    }
}

/// Compile a `(fn [name] (args...) body...)` form into an unbound closure.
pub fn compile_function(eval: &mut dyn Evaluator, form: &Value) -> Result<Closure> {
    let forms = SpecialForms::new(eval.symbols());
    FunctionCompiler::new(eval, &forms).compile(form)
}

/// Wrap `form` in a zero-argument function, `(fn nil form)`, and compile it.
pub fn compile_thunk(eval: &mut dyn Evaluator, form: &Value) -> Result<Closure> {
    let forms = SpecialForms::new(eval.symbols());
    let wrapped = Value::list(vec![
        Value::Symbol(forms.fn_.clone()),
        Value::nil(),
        form.clone(),
    ]);
    FunctionCompiler::new(eval, &forms).compile(&wrapped)
}

/// Expand macro calls at the head of `form` until it stops changing.
pub fn macroexpand(eval: &mut dyn Evaluator, form: Value) -> Result<Value> {
    let forms = SpecialForms::new(eval.symbols());
    FunctionCompiler::new(eval, &forms).macroexpand(form)
}

struct ArgList {
    n_positional: usize,
    variadic: bool,
    symbols: Vec<Symbol>,
}

struct ParsedFunction {
    name: Option<Symbol>,
    args: ArgList,
    body: Vec<Value>,
}

struct FunctionCompiler<'a> {
    eval: &'a mut dyn Evaluator,
    forms: &'a SpecialForms,
    writer: BytecodeWriter,
    constants: Vec<Value>,
    label_counter: u16,
    depth: usize,
    max_depth: usize,
}

impl<'a> FunctionCompiler<'a> {
    fn new(eval: &'a mut dyn Evaluator, forms: &'a SpecialForms) -> Self {
        let max_depth = eval.max_compile_depth();
        FunctionCompiler {
            eval,
            forms,
            writer: BytecodeWriter::new(),
            constants: Vec::new(),
            label_counter: 0,
            depth: 0,
            max_depth,
        }
    }

    /// A compiler for a function nested `depth` forms inside another, so the
    /// nesting limit spans the whole top-level form.
    fn nested(eval: &'a mut dyn Evaluator, forms: &'a SpecialForms, depth: usize) -> Self {
        let mut compiler = FunctionCompiler::new(eval, forms);
        compiler.depth = depth;
        compiler
    }

    fn compile(mut self, form: &Value) -> Result<Closure> {
        let parsed = parse_function(form, self.forms)?;
        // Argument symbols occupy the first constant slots, in order, so the
        // engine can bind arguments by index.
        self.constants
            .extend(parsed.args.symbols.iter().cloned().map(Value::Symbol));
        self.compile_body(&parsed.body)?;
        self.writer.write(Instruction::Ret);

        let name: Rc<str> = match &parsed.name {
            Some(sym) => Rc::from(sym.name()),
            None => Rc::from("anonymous"),
        };
        let code = self.writer.bytecode()?;
        trace!(function = %name, words = code.len(), constants = self.constants.len(), "compiled");
        Ok(Closure::new(
            name,
            code,
            parsed.args.n_positional,
            parsed.args.variadic,
            self.constants,
        ))
    }

    fn macroexpand(&mut self, mut form: Value) -> Result<Value> {
        loop {
            let expanded = self.macroexpand_once(&form)?;
            if expanded.identical(&form) {
                return Ok(expanded);
            }
            form = expanded;
        }
    }

    fn macroexpand_once(&mut self, form: &Value) -> Result<Value> {
        let Value::List(list) = form else {
            return Ok(form.clone());
        };
        let Some(Value::Symbol(head)) = list.first() else {
            return Ok(form.clone());
        };
        if self.forms.is_special(head) {
            return Ok(form.clone());
        }
        match self.eval.lookup_global(head) {
            Some(Value::Closure(mac)) if mac.is_macro() => {
                trace!(macro_name = %head, "expanding");
                let args = &list.as_slice()[1..];
                self.eval.apply(&mac, args)
            }
            _ => Ok(form.clone()),
        }
    }

    fn compile_body(&mut self, body: &[Value]) -> Result<()> {
        let Some((last, init)) = body.split_last() else {
            return self.compile_const(Value::nil());
        };
        for form in init {
            self.compile_form(form)?;
            self.writer.write(Instruction::Pop);
        }
        self.compile_form(last)
    }

    fn compile_form(&mut self, form: &Value) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(BunnyError::resource_exhausted(format!(
                "forms nested more than {} deep",
                self.max_depth
            )));
        }
        let result = self.compile_form_inner(form);
        self.depth -= 1;
        result
    }

    fn compile_form_inner(&mut self, form: &Value) -> Result<()> {
        let form = self.macroexpand(form.clone())?;
        match &form {
            Value::List(list) if !list.is_nil() => self.compile_list(list.as_slice()),
            Value::Symbol(_) => {
                self.compile_const(form.clone())?;
                self.writer.write(Instruction::Load);
                Ok(())
            }
            _ => self.compile_const(form.clone()),
        }
    }

    fn compile_list(&mut self, items: &[Value]) -> Result<()> {
        if let Some(Value::Symbol(head)) = items.first() {
            let forms = self.forms;
            if *head == forms.fn_ {
                let list = Value::list(items.to_vec());
                let nested =
                    FunctionCompiler::nested(&mut *self.eval, forms, self.depth).compile(&list)?;
                self.compile_const(Value::closure(nested))?;
                self.writer.write(Instruction::Closure);
                return Ok(());
            }
            if *head == forms.quote {
                let quoted = items
                    .get(1)
                    .ok_or_else(|| BunnyError::syntax("quote requires an argument"))?;
                return self.compile_const(quoted.clone());
            }
            if *head == forms.if_ {
                return self.compile_if(items);
            }
            if *head == forms.def {
                return self.compile_assignment(items, "def", Instruction::Def);
            }
            if *head == forms.set {
                return self.compile_assignment(items, "set!", Instruction::Store);
            }
        }
        self.compile_call(items)
    }

    fn compile_if(&mut self, items: &[Value]) -> Result<()> {
        let test = items
            .get(1)
            .ok_or_else(|| BunnyError::syntax("if requires a test"))?;
        let then = items
            .get(2)
            .ok_or_else(|| BunnyError::syntax("if requires a then branch"))?;
        let otherwise = items.get(3).cloned().unwrap_or_else(Value::nil);

        let else_label = self.label()?;
        let end_label = self.label()?;

        self.compile_form(test)?;
        self.writer.write(Instruction::JumpIfNot(else_label));
        self.compile_form(then)?;
        self.writer.write(Instruction::Jump(end_label));
        self.writer.write(Instruction::Label(else_label));
        self.compile_form(&otherwise)?;
        self.writer.write(Instruction::Label(end_label));
        Ok(())
    }

    fn compile_assignment(
        &mut self,
        items: &[Value],
        what: &str,
        instruction: Instruction,
    ) -> Result<()> {
        let target = items
            .get(1)
            .ok_or_else(|| BunnyError::syntax(format!("{what} requires a name")))?;
        if !matches!(target, Value::Symbol(_)) {
            return Err(BunnyError::type_error_with_value("symbol", target));
        }
        let value = items
            .get(2)
            .ok_or_else(|| BunnyError::syntax(format!("{what} requires a value")))?;
        self.compile_const(target.clone())?;
        self.compile_form(value)?;
        self.writer.write(instruction);
        Ok(())
    }

    fn compile_call(&mut self, items: &[Value]) -> Result<()> {
        for form in items {
            self.compile_form(form)?;
        }
        let argc = u16::try_from(items.len() - 1)
            .map_err(|_| BunnyError::resource_exhausted("too many call arguments"))?;
        self.writer.write(Instruction::Call(argc));
        Ok(())
    }

    fn compile_const(&mut self, val: Value) -> Result<()> {
        let index = self.const_index(val)?;
        self.writer.write(Instruction::Const(index));
        Ok(())
    }

    /// Constants are deduplicated by identity, not structure.
    fn const_index(&mut self, val: Value) -> Result<u16> {
        let index = match self.constants.iter().position(|c| c.identical(&val)) {
            Some(i) => i,
            None => {
                self.constants.push(val);
                self.constants.len() - 1
            }
        };
        u16::try_from(index).map_err(|_| BunnyError::resource_exhausted("constant pool full"))
    }

    fn label(&mut self) -> Result<u16> {
        let id = self.label_counter;
        self.label_counter = id
            .checked_add(1)
            .ok_or_else(|| BunnyError::resource_exhausted("too many labels in one function"))?;
        Ok(id)
    }
}

fn parse_function(form: &Value, forms: &SpecialForms) -> Result<ParsedFunction> {
    let list = form
        .as_list()
        .ok_or_else(|| BunnyError::type_error_with_value("list", form))?;
    let items = list.as_slice();
    match items.first() {
        Some(Value::Symbol(head)) if *head == forms.fn_ => {}
        Some(other) => return Err(BunnyError::syntax(format!("expected fn, found {other}"))),
        None => return Err(BunnyError::syntax("expected fn, found ()")),
    }

    // A symbol in second position names the function; anything else is the
    // argument list.
    let (name, args_at) = match items.get(1) {
        Some(Value::Symbol(sym)) => (Some(sym.clone()), 2),
        _ => (None, 1),
    };
    let args = items
        .get(args_at)
        .ok_or_else(|| BunnyError::syntax("fn requires an argument list"))?;
    let args = args
        .as_list()
        .ok_or_else(|| BunnyError::type_error_with_value("list", args))?;

    Ok(ParsedFunction {
        name,
        args: parse_arg_list(args.as_slice(), &forms.rest_marker)?,
        body: items[args_at + 1..].to_vec(),
    })
}

fn parse_arg_list(args: &[Value], rest_marker: &Symbol) -> Result<ArgList> {
    let mut n_positional = 0;
    let mut variadic = false;
    let mut symbols = Vec::with_capacity(args.len());

    for (i, arg) in args.iter().enumerate() {
        let sym = arg
            .as_symbol()
            .ok_or_else(|| BunnyError::type_error_with_value("symbol", arg))?;
        if sym == rest_marker {
            let rest = args
                .get(i + 1)
                .ok_or_else(|| BunnyError::syntax("& must be followed by a rest parameter"))?;
            let rest = rest
                .as_symbol()
                .ok_or_else(|| BunnyError::type_error_with_value("symbol", rest))?;
            if args.len() > i + 2 {
                return Err(BunnyError::syntax(
                    "only one parameter may follow &",
                ));
            }
            symbols.push(rest.clone());
            variadic = true;
            break;
        }
        symbols.push(sym.clone());
        n_positional += 1;
    }

    Ok(ArgList {
        n_positional,
        variadic,
        symbols,
    })
}
