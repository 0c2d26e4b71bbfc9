use std::path::Path;

use bunny_core::{check_arity, BunnyError, Intrinsic, Value};
use tracing::debug;

use crate::{register_fn, register_fn_eval};

pub fn register(out: &mut Vec<Intrinsic>) {
    register_fn(out, "print", |args| {
        check_arity!(args, "print", 1);
        println!("{}", args[0]);
        Ok(Value::nil())
    });

    register_fn_eval(out, "load", |eval, args| {
        check_arity!(args, "load", 1);
        let path = args[0]
            .as_str()
            .ok_or_else(|| BunnyError::type_error_with_value("string", &args[0]))?;
        debug!(path, "loading file");
        eval.load_file(Path::new(path))?;
        Ok(Value::nil())
    });
}

#[cfg(test)]
mod tests {
    use bunny_core::{BunnyError, Value};

    use crate::test_support::{call, n};

    #[test]
    fn test_print_returns_nil() {
        assert!(call("print", &[n(1.0)]).unwrap().is_nil());
        assert!(matches!(call("print", &[]), Err(BunnyError::Arity { .. })));
    }

    #[test]
    fn test_load_requires_string() {
        assert!(matches!(call("load", &[n(1.0)]), Err(BunnyError::Type { .. })));
        assert!(matches!(
            call("load", &[Value::string("missing.bny")]),
            Err(BunnyError::Io(_))
        ));
    }
}
