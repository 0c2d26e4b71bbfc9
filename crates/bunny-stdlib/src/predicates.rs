use bunny_core::{check_arity, Intrinsic, Value};

use crate::register_fn_eval;

pub fn register(out: &mut Vec<Intrinsic>) {
    // Answers with a symbol so programs can compare it with `identical?`.
    register_fn_eval(out, "type-of", |eval, args| {
        check_arity!(args, "type-of", 1);
        Ok(Value::Symbol(eval.intern(args[0].type_name())))
    });
}
