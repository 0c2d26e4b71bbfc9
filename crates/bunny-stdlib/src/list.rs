use bunny_core::{check_arity, BunnyError, Intrinsic, Value};

use crate::register_fn;

pub fn register(out: &mut Vec<Intrinsic>) {
    register_fn(out, "cons", |args| {
        check_arity!(args, "cons", 2);
        let tail = args[1].expect_list()?;
        let mut items = Vec::with_capacity(tail.len() + 1);
        items.push(args[0].clone());
        items.extend(tail.iter().cloned());
        Ok(Value::list(items))
    });

    register_fn(out, "list", |args| Ok(Value::list(args.to_vec())));

    register_fn(out, "list*", |args| {
        check_arity!(args, "list*", 2..);
        let last = args.len() - 1;
        let tail = args[last].expect_list()?;
        let mut items = args[..last].to_vec();
        items.extend(tail.iter().cloned());
        Ok(Value::list(items))
    });

    register_fn(out, "append", |args| {
        check_arity!(args, "append", 2);
        match &args[0] {
            Value::List(l) => {
                let mut items = l.as_slice().to_vec();
                items.push(args[1].clone());
                Ok(Value::list(items))
            }
            Value::String(s) => match &args[1] {
                Value::String(t) => Ok(Value::string(&format!("{s}{t}"))),
                other => Err(BunnyError::type_error_with_value("string", other)),
            },
            other => Err(BunnyError::type_error_with_value("list or string", other)),
        }
    });

    register_fn(out, "concat", |args| {
        check_arity!(args, "concat", 1..);
        match &args[0] {
            Value::String(_) => {
                let mut joined = String::new();
                for arg in args {
                    match arg.as_str() {
                        Some(s) => joined.push_str(s),
                        None => return Err(BunnyError::type_error_with_value("string", arg)),
                    }
                }
                Ok(Value::string(&joined))
            }
            Value::List(_) => {
                let mut items = Vec::new();
                for arg in args {
                    items.extend(arg.expect_list()?.iter().cloned());
                }
                Ok(Value::list(items))
            }
            other => Err(BunnyError::type_error_with_value("list or string", other)),
        }
    });

    register_fn(out, "nth", |args| {
        check_arity!(args, "nth", 2);
        let index = args[1].expect_number()?;
        match &args[0] {
            Value::List(l) => {
                let i = checked_index(index, l.len())?;
                Ok(l.as_slice()[i].clone())
            }
            Value::String(s) => {
                let len = s.chars().count();
                let i = checked_index(index, len)?;
                let ch: String = s.chars().skip(i).take(1).collect();
                Ok(Value::string(&ch))
            }
            other => Err(BunnyError::type_error_with_value("list or string", other)),
        }
    });

    register_fn(out, "rest", |args| {
        check_arity!(args, "rest", 1);
        Ok(Value::List(args[0].expect_list()?.rest()))
    });
}

/// Indexes must be whole, non-negative and inside the sequence.
fn checked_index(index: f64, len: usize) -> bunny_core::Result<usize> {
    if index.fract() != 0.0 || index < 0.0 || index >= len as f64 {
        return Err(BunnyError::index(index, len));
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use bunny_core::{BunnyError, Value};

    use crate::test_support::{call, n};

    fn nums(xs: &[f64]) -> Value {
        Value::list(xs.iter().copied().map(Value::Number).collect())
    }

    #[test]
    fn test_cons() {
        assert_eq!(call("cons", &[n(1.0), nums(&[2.0, 3.0])]).unwrap(), nums(&[1.0, 2.0, 3.0]));
        assert_eq!(call("cons", &[n(1.0), Value::nil()]).unwrap(), nums(&[1.0]));
        assert!(matches!(
            call("cons", &[n(1.0), n(2.0)]),
            Err(BunnyError::Type { .. })
        ));
    }

    #[test]
    fn test_list_and_list_star() {
        assert!(call("list", &[]).unwrap().is_nil());
        assert_eq!(call("list", &[n(1.0), n(2.0)]).unwrap(), nums(&[1.0, 2.0]));
        assert_eq!(
            call("list*", &[n(1.0), n(2.0), nums(&[3.0, 4.0])]).unwrap(),
            nums(&[1.0, 2.0, 3.0, 4.0])
        );
        assert!(matches!(call("list*", &[nums(&[1.0])]), Err(BunnyError::Arity { .. })));
        assert!(matches!(
            call("list*", &[n(1.0), n(2.0)]),
            Err(BunnyError::Type { .. })
        ));
    }

    #[test]
    fn test_append() {
        assert_eq!(call("append", &[nums(&[1.0]), n(2.0)]).unwrap(), nums(&[1.0, 2.0]));
        assert_eq!(call("append", &[Value::nil(), n(2.0)]).unwrap(), nums(&[2.0]));
        assert_eq!(
            call("append", &[Value::string("ab"), Value::string("cd")]).unwrap(),
            Value::string("abcd")
        );
        assert!(call("append", &[Value::string("ab"), n(1.0)]).is_err());
        assert!(call("append", &[n(1.0), n(1.0)]).is_err());
    }

    #[test]
    fn test_concat() {
        assert_eq!(
            call("concat", &[nums(&[1.0]), Value::nil(), nums(&[2.0, 3.0])]).unwrap(),
            nums(&[1.0, 2.0, 3.0])
        );
        assert_eq!(
            call("concat", &[Value::string("a"), Value::string("b"), Value::string("c")]).unwrap(),
            Value::string("abc")
        );
        assert!(call("concat", &[Value::string("a"), nums(&[1.0])]).is_err());
        assert!(matches!(call("concat", &[]), Err(BunnyError::Arity { .. })));
    }

    #[test]
    fn test_nth() {
        let l = nums(&[10.0, 20.0, 30.0]);
        assert_eq!(call("nth", &[l.clone(), n(1.0)]).unwrap(), n(20.0));
        assert!(matches!(
            call("nth", &[l.clone(), n(3.0)]),
            Err(BunnyError::Index { len: 3, .. })
        ));
        assert!(matches!(call("nth", &[l.clone(), n(-1.0)]), Err(BunnyError::Index { .. })));
        assert!(matches!(call("nth", &[l, n(0.5)]), Err(BunnyError::Index { .. })));
        assert_eq!(
            call("nth", &[Value::string("héllo"), n(1.0)]).unwrap(),
            Value::string("é")
        );
    }

    #[test]
    fn test_rest() {
        assert_eq!(call("rest", &[nums(&[1.0, 2.0])]).unwrap(), nums(&[2.0]));
        assert!(call("rest", &[nums(&[1.0])]).unwrap().is_nil());
        assert!(call("rest", &[Value::nil()]).unwrap().is_nil());
        assert!(call("rest", &[n(1.0)]).is_err());
    }
}
