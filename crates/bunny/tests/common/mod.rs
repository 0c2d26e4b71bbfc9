#![allow(dead_code)]

use bunny::{BunnyError, Interpreter, Value};

pub fn interp() -> Interpreter {
    Interpreter::new().unwrap_or_else(|e| panic!("prelude failed to load: {e}"))
}

/// Evaluate with a fresh interpreter, panicking with the input on error.
pub fn eval(input: &str) -> Value {
    interp()
        .eval_str(input)
        .unwrap_or_else(|e| panic!("eval failed for `{input}`: {e}"))
}

pub fn eval_err(input: &str) -> BunnyError {
    match interp().eval_str(input) {
        Ok(val) => panic!("expected error for `{input}`, got {val}"),
        Err(e) => e,
    }
}

pub fn num(n: f64) -> Value {
    Value::Number(n)
}

pub fn nums(xs: &[f64]) -> Value {
    Value::list(xs.iter().copied().map(Value::Number).collect())
}
