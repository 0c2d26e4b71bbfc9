use bunny_core::{check_arity, BunnyError, Intrinsic, Value};

use crate::register_fn_eval;

pub fn register(out: &mut Vec<Intrinsic>) {
    register_fn_eval(out, "intern", |eval, args| {
        check_arity!(args, "intern", 1);
        let name = args[0]
            .as_str()
            .ok_or_else(|| BunnyError::type_error_with_value("string", &args[0]))?;
        Ok(Value::Symbol(eval.intern(name)))
    });

    register_fn_eval(out, "gensym", |eval, args| {
        check_arity!(args, "gensym", 0..=1);
        let prefix = match args.first() {
            None => "gensym",
            Some(v) => v
                .as_str()
                .ok_or_else(|| BunnyError::type_error_with_value("string", v))?,
        };
        Ok(Value::Symbol(eval.symbols().gensym(prefix)))
    });

    register_fn_eval(out, "macro!", |_eval, args| {
        check_arity!(args, "macro!", 1);
        args[0].expect_closure()?.set_macro(true);
        Ok(args[0].clone())
    });

    register_fn_eval(out, "apply", |eval, args| {
        check_arity!(args, "apply", 2);
        let call_args = args[1].expect_list()?;
        match &args[0] {
            Value::Intrinsic(f) => f.call(eval, call_args.as_slice()),
            Value::Closure(c) => eval.apply(c, call_args.as_slice()),
            other => Err(BunnyError::type_error_with_value("function", other)),
        }
    });
}
