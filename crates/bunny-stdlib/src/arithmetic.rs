use bunny_core::{check_arity, Intrinsic, Value};

use crate::register_fn;

fn numbers(args: &[Value]) -> bunny_core::Result<Vec<f64>> {
    args.iter().map(Value::expect_number).collect()
}

pub fn register(out: &mut Vec<Intrinsic>) {
    register_fn(out, "+", |args| {
        Ok(Value::Number(numbers(args)?.into_iter().sum()))
    });

    register_fn(out, "-", |args| {
        let nums = numbers(args)?;
        Ok(Value::Number(match nums.as_slice() {
            [] => 0.0,
            [x] => -x,
            [first, rest @ ..] => rest.iter().fold(*first, |acc, x| acc - x),
        }))
    });

    register_fn(out, "*", |args| {
        Ok(Value::Number(numbers(args)?.into_iter().product()))
    });

    register_fn(out, "/", |args| {
        check_arity!(args, "/", 1..);
        let nums = numbers(args)?;
        Ok(Value::Number(
            nums[1..].iter().fold(nums[0], |acc, x| acc / x),
        ))
    });
}
