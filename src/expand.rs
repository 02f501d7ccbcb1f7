// ABOUTME: Macro expander and top-level driver (define/defmacro/include/expand)

use crate::env::{self, Env};
use crate::error::LispError;
use crate::eval::{self, build_closure, invoke_closure};
use crate::reader::{Reader, StrSource};
use crate::value::Value;

/// Pure structural rewriter: expands macro calls under `menv` until no
/// macro head remains. Never evaluates side-effecting forms; the sole
/// exception (per the defmacro rule) is that macro bodies themselves run
/// as closures when invoked here, since macro invocation *is* expansion.
pub fn expand(expr: &Value, menv: &Env) -> Result<Value, LispError> {
    match expr {
        Value::Cons(_) => {
            if expr.car().is_symbol_named("quote") {
                return Ok(expr.clone());
            }
            if let Value::Symbol(name) = expr.car() {
                if let Some(macro_closure) = env::lookup(menv, &name) {
                    let raw_args = expr
                        .cdr()
                        .to_vec()
                        .ok_or(LispError::Malformed("macro call"))?;
                    let rewritten = invoke_closure(&macro_closure, raw_args)?;
                    return expand(&rewritten, menv);
                }
            }
            let car = expand(&expr.car(), menv)?;
            let cdr = expand(&expr.cdr(), menv)?;
            Ok(Value::cons(car, cdr))
        }
        _ => Ok(expr.clone()),
    }
}

/// Runs one top-level form to completion, logging and returning the
/// `error` sentinel on failure rather than propagating — callers (REPL,
/// file loader) move on to the next top-level form either way.
pub fn process_top(expr: &Value, env: &mut Env, menv: &mut Env) -> Value {
    match dispatch_top(expr, env, menv) {
        Ok(value) => value,
        Err(e) => {
            log::error!("{e}");
            Value::Error
        }
    }
}

fn dispatch_top(expr: &Value, env: &mut Env, menv: &mut Env) -> Result<Value, LispError> {
    if let Value::Cons(_) = expr {
        if let Value::Symbol(head) = expr.car() {
            match &*head {
                "define" => return top_define(expr, env, menv),
                "defmacro" => return top_defmacro(expr, env, menv),
                "include" => return top_include(expr, env, menv),
                "expand" => return top_expand(expr, env, menv),
                _ => {}
            }
        }
    }
    let expanded = expand(expr, menv)?;
    eval::eval(&expanded, env)
}

fn top_define(expr: &Value, env: &mut Env, menv: &Env) -> Result<Value, LispError> {
    let args = expr.cdr().to_vec().ok_or(LispError::Malformed("define"))?;
    let [name_form, rhs] = args.as_slice() else {
        return Err(LispError::Malformed("define"));
    };
    let name = match name_form {
        Value::Symbol(s) => s.clone(),
        _ => return Err(LispError::Malformed("define")),
    };
    let expanded = expand(rhs, menv)?;
    let value = eval::eval(&expanded, env)?;
    env::define(env, name, value);
    Ok(Value::Nil)
}

fn top_defmacro(expr: &Value, env: &Env, menv: &mut Env) -> Result<Value, LispError> {
    let args = expr
        .cdr()
        .to_vec()
        .ok_or(LispError::Malformed("defmacro"))?;
    let [name_form, params, body] = args.as_slice() else {
        return Err(LispError::Malformed("defmacro"));
    };
    let name = match name_form {
        Value::Symbol(s) => s.clone(),
        _ => return Err(LispError::Malformed("defmacro")),
    };
    let closure = build_closure(params, body, env)?;
    env::define(menv, name, closure);
    Ok(Value::Nil)
}

fn top_include(expr: &Value, env: &mut Env, menv: &mut Env) -> Result<Value, LispError> {
    let args = expr.cdr().to_vec().ok_or(LispError::Malformed("include"))?;
    let [path_form] = args.as_slice() else {
        return Err(LispError::Malformed("include"));
    };
    let path = match path_form {
        Value::Str(s) => s.to_string(),
        _ => return Err(LispError::Malformed("include")),
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| LispError::Include {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let mut reader = Reader::new(StrSource::new(&contents));
    loop {
        match reader.read()? {
            None => break,
            Some(form) => {
                dispatch_top(&form, env, menv)?;
            }
        }
    }
    Ok(Value::Nil)
}

fn top_expand(expr: &Value, env: &mut Env, menv: &mut Env) -> Result<Value, LispError> {
    let args = expr.cdr().to_vec().ok_or(LispError::Malformed("expand"))?;
    let [x] = args.as_slice() else {
        return Err(LispError::Malformed("expand"));
    };
    let expanded = expand(x, menv)?;
    let value = eval::eval(&expanded, env)?;
    expand(&value, menv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_one;

    fn run_all(source: &str) -> Value {
        let mut env = Env::new();
        let mut menv = Env::new();
        let mut last = Value::Nil;
        let mut reader = Reader::new(StrSource::new(source));
        while let Some(form) = reader.read().unwrap() {
            last = process_top(&form, &mut env, &mut menv);
        }
        last
    }

    #[test]
    fn lexical_capture_across_top_level_forms() {
        let last = run_all("(define a 1) (define f (lambda () a)) (define a 2) (f)");
        assert_eq!(last, Value::Number(1));
    }

    #[test]
    fn macro_expansion_precedes_evaluation() {
        let mut env = Env::new();
        let mut menv = Env::new();
        process_top(
            &read_one("(defmacro when (c body) (list (quote if) c body (quote nil)))")
                .unwrap()
                .unwrap(),
            &mut env,
            &mut menv,
        );
        let truthy = read_one("(when 1 42)").unwrap().unwrap();
        assert_eq!(
            process_top(&truthy, &mut env, &mut menv),
            Value::Number(42)
        );
        let falsy = read_one("(when nil 42)").unwrap().unwrap();
        assert_eq!(process_top(&falsy, &mut env, &mut menv), Value::Nil);
    }

    #[test]
    fn define_updates_in_place() {
        let mut env = Env::new();
        let mut menv = Env::new();
        process_top(
            &read_one("(define x 1)").unwrap().unwrap(),
            &mut env,
            &mut menv,
        );
        process_top(
            &read_one("(define x 2)").unwrap().unwrap(),
            &mut env,
            &mut menv,
        );
        assert_eq!(env.len(), 1);
        assert_eq!(env::lookup(&env, "x"), Some(Value::Number(2)));
    }

    #[test]
    fn expand_form_evaluates_and_reexpands() {
        let mut env = Env::new();
        let mut menv = Env::new();
        process_top(
            &read_one("(defmacro twice (x) (list (quote +) x x))")
                .unwrap()
                .unwrap(),
            &mut env,
            &mut menv,
        );
        let result = process_top(
            &read_one("(expand (twice 21))").unwrap().unwrap(),
            &mut env,
            &mut menv,
        );
        assert_eq!(result, Value::Number(42));
    }

    #[test]
    fn evaluation_error_does_not_abort_the_driver() {
        let mut env = Env::new();
        let mut menv = Env::new();
        let err = process_top(&read_one("(/ 1 0)").unwrap().unwrap(), &mut env, &mut menv);
        assert!(err.is_error());
        let ok = process_top(&read_one("42").unwrap().unwrap(), &mut env, &mut menv);
        assert_eq!(ok, Value::Number(42));
    }

    #[test]
    fn include_stops_at_first_failure_inside_the_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("schemeful_expand_test_{}.lisp", std::process::id()));
        std::fs::write(&path, "(define a 1)\n(/ 1 0)\n(define b 2)\n").unwrap();

        let mut env = Env::new();
        let mut menv = Env::new();
        let include_form =
            read_one(&format!("(include \"{}\")", path.display()))
                .unwrap()
                .unwrap();
        let result = process_top(&include_form, &mut env, &mut menv);

        assert!(result.is_error());
        assert_eq!(env::lookup(&env, "a"), Some(Value::Number(1)));
        assert_eq!(env::lookup(&env, "b"), None);

        std::fs::remove_file(&path).ok();
    }
}
