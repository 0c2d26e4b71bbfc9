mod arithmetic;
mod comparison;
mod io;
mod list;
mod meta;
mod predicates;

use bunny_core::{Evaluator, Intrinsic, Result, Value};

/// Every intrinsic, ready to be bound in a global environment.
pub fn intrinsics() -> Vec<Intrinsic> {
    let mut out = Vec::new();
    arithmetic::register(&mut out);
    comparison::register(&mut out);
    list::register(&mut out);
    predicates::register(&mut out);
    meta::register(&mut out);
    io::register(&mut out);
    out
}

fn register_fn(
    out: &mut Vec<Intrinsic>,
    name: &str,
    f: impl Fn(&[Value]) -> Result<Value> + 'static,
) {
    out.push(Intrinsic::simple(name, f));
}

fn register_fn_eval(
    out: &mut Vec<Intrinsic>,
    name: &str,
    f: impl Fn(&mut dyn Evaluator, &[Value]) -> Result<Value> + 'static,
) {
    out.push(Intrinsic::with_evaluator(name, f));
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::rc::Rc;

    use bunny_core::{BunnyError, Closure, Evaluator, Result, Symbol, SymbolTable, Value};

    /// Evaluator that can intern symbols and nothing else.
    pub struct Symbols(pub SymbolTable);

    impl Evaluator for Symbols {
        fn apply(&mut self, _: &Rc<Closure>, _: &[Value]) -> Result<Value> {
            Err(BunnyError::invalid_state("no engine"))
        }
        fn lookup_global(&self, _: &Symbol) -> Option<Value> {
            None
        }
        fn symbols(&mut self) -> &mut SymbolTable {
            &mut self.0
        }
        fn load_file(&mut self, path: &Path) -> Result<Value> {
            Err(BunnyError::io(format!("{}: no engine", path.display())))
        }
    }

    pub fn call(name: &str, args: &[Value]) -> Result<Value> {
        let mut eval = Symbols(SymbolTable::new());
        call_with(&mut eval, name, args)
    }

    pub fn call_with(eval: &mut Symbols, name: &str, args: &[Value]) -> Result<Value> {
        let intrinsic = super::intrinsics()
            .into_iter()
            .find(|i| i.name == name)
            .unwrap_or_else(|| panic!("no intrinsic named {name}"));
        intrinsic.call(eval, args)
    }

    pub fn n(x: f64) -> Value {
        Value::Number(x)
    }
}
