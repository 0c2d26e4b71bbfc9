use bunny_core::{check_arity, Intrinsic, Value};

use crate::register_fn;

pub fn register(out: &mut Vec<Intrinsic>) {
    register_fn(out, "<", |args| {
        check_arity!(args, "<", 2);
        Ok(Value::Boolean(
            args[0].expect_number()? < args[1].expect_number()?,
        ))
    });

    register_fn(out, ">", |args| {
        check_arity!(args, ">", 2);
        Ok(Value::Boolean(
            args[0].expect_number()? > args[1].expect_number()?,
        ))
    });

    register_fn(out, "identical?", |args| {
        check_arity!(args, "identical?", 2);
        Ok(Value::Boolean(args[0].identical(&args[1])))
    });

    register_fn(out, "equal?", |args| {
        check_arity!(args, "equal?", 2);
        Ok(Value::Boolean(args[0] == args[1]))
    });
}
