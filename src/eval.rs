// ABOUTME: Evaluator — special forms, closure creation/invocation, primitives

use crate::env::{self, Env};
use crate::error::LispError;
use crate::value::{Value, TRUE};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reserved head names: special forms, primitives, and the top-level-only
/// forms. Excluded from free-variable capture and never shadowable via
/// macro expansion (lexical `let`/`lambda` binding can still shadow them).
pub const BUILTIN_NAMES: &[&str] = &[
    "quote", "if", "lambda", "let", "begin", "eval", "gensym", "tag?", "car", "cdr", "cons",
    "list", "list*", "print", "display", "error", "apply", "+", "-", "*", "/", ">", "=", "define",
    "defmacro", "include", "expand",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

static GENSYM_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn eval(expr: &Value, env: &Env) -> Result<Value, LispError> {
    match expr {
        Value::Error => Ok(Value::Error),
        Value::Nil => Ok(Value::Nil),
        Value::Number(_) | Value::Str(_) => Ok(expr.clone()),
        Value::Symbol(name) => {
            env::lookup(env, name).ok_or_else(|| LispError::UndefinedSymbol(name.to_string()))
        }
        Value::Cons(_) => eval_form(expr, env),
    }
}

fn eval_form(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let head = expr.car();
    if let Value::Symbol(name) = &head {
        match &**name {
            "quote" => return eval_quote(expr),
            "if" => return eval_if(expr, env),
            "lambda" => return eval_lambda(expr, env),
            "let" => return eval_let(expr, env),
            "begin" => return eval_begin(expr, env),
            "eval" => return eval_eval(expr, env),
            "gensym" => return eval_gensym(expr),
            "tag?" => return eval_tag(expr, env),
            "car" => return eval_car(expr, env),
            "cdr" => return eval_cdr(expr, env),
            "cons" => return eval_cons(expr, env),
            "list" => return eval_list(expr, env),
            "list*" => return eval_list_star(expr, env),
            "print" => return eval_print(expr, env, false),
            "display" => return eval_print(expr, env, true),
            "error" => return eval_error(expr, env),
            "apply" => return eval_apply(expr, env),
            "+" => {
                return eval_binary_numeric(expr, env, "+", |a, b| {
                    Ok(Value::Number(a.wrapping_add(b)))
                })
            }
            "-" => {
                return eval_binary_numeric(expr, env, "-", |a, b| {
                    Ok(Value::Number(a.wrapping_sub(b)))
                })
            }
            "*" => {
                return eval_binary_numeric(expr, env, "*", |a, b| {
                    Ok(Value::Number(a.wrapping_mul(b)))
                })
            }
            "/" => {
                return eval_binary_numeric(expr, env, "/", |a, b| {
                    if b == 0 {
                        Err(LispError::DivisionByZero)
                    } else {
                        Ok(Value::Number(a.wrapping_div(b)))
                    }
                })
            }
            ">" => {
                return eval_binary_numeric(
                    expr,
                    env,
                    ">",
                    |a, b| Ok(if a > b { TRUE } else { Value::Nil }),
                )
            }
            "=" => return eval_equal(expr, env),
            "define" | "defmacro" | "include" | "expand" => {
                return Err(LispError::TopLevelOnly(top_level_only_name(name)));
            }
            _ => {}
        }
    }
    eval_call(expr, env)
}

fn top_level_only_name(name: &str) -> &'static str {
    match name {
        "define" => "define",
        "defmacro" => "defmacro",
        "include" => "include",
        "expand" => "expand",
        _ => "that form",
    }
}

fn args_of(expr: &Value, form: &'static str) -> Result<Vec<Value>, LispError> {
    expr.cdr().to_vec().ok_or(LispError::Malformed(form))
}

fn eval_args(rest: &Value, env: &Env) -> Result<Vec<Value>, LispError> {
    let items = rest.to_vec().ok_or(LispError::Malformed("argument list"))?;
    items.iter().map(|e| eval(e, env)).collect()
}

fn eval_quote(expr: &Value) -> Result<Value, LispError> {
    let args = args_of(expr, "quote")?;
    match args.as_slice() {
        [x] => Ok(x.clone()),
        _ => Err(LispError::Malformed("quote")),
    }
}

fn eval_if(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "if")?;
    let [cond, then, els] = args.as_slice() else {
        return Err(LispError::Malformed("if"));
    };
    if eval(cond, env)?.is_nil() {
        eval(els, env)
    } else {
        eval(then, env)
    }
}

fn eval_begin(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "begin")?;
    let mut result = Value::Nil;
    for a in &args {
        result = eval(a, env)?;
    }
    Ok(result)
}

fn eval_let(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "let")?;
    let [bindings_form, body] = args.as_slice() else {
        return Err(LispError::Malformed("let"));
    };
    let bindings = bindings_form.to_vec().ok_or(LispError::Malformed("let"))?;
    if bindings.is_empty() {
        return Err(LispError::Malformed("let"));
    }

    let mut new_bindings = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        let pair = binding.to_vec().ok_or(LispError::Malformed("let"))?;
        let [name, value_form] = pair.as_slice() else {
            return Err(LispError::Malformed("let"));
        };
        let name = symbol_name(name, "let")?;
        let value = eval(value_form, env)?;
        new_bindings.push((name, value));
    }

    let extended = env::extend_front(env, new_bindings);
    eval(body, &extended)
}

fn eval_eval(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "eval")?;
    let [x] = args.as_slice() else {
        return Err(LispError::Malformed("eval"));
    };
    let value = eval(x, env)?;
    eval(&value, &Env::new())
}

fn eval_gensym(expr: &Value) -> Result<Value, LispError> {
    let args = args_of(expr, "gensym")?;
    if !args.is_empty() {
        return Err(LispError::Malformed("gensym"));
    }
    let n = GENSYM_COUNTER.fetch_add(1, Ordering::Relaxed);
    Ok(Value::symbol(format!("#:g{n}")))
}

fn eval_tag(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "tag?")?;
    let [x] = args.as_slice() else {
        return Err(LispError::Malformed("tag?"));
    };
    let value = eval(x, env)?;
    Ok(Value::Number(value.tag()))
}

fn eval_car(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "car")?;
    let [x] = args.as_slice() else {
        return Err(LispError::Arity {
            form: "car",
            expected: 1,
            actual: args.len(),
        });
    };
    match eval(x, env)? {
        Value::Cons(pair) => Ok(pair.0.clone()),
        _ => Err(LispError::TypeMismatch {
            form: "car",
            expected: "cons",
        }),
    }
}

fn eval_cdr(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "cdr")?;
    let [x] = args.as_slice() else {
        return Err(LispError::Arity {
            form: "cdr",
            expected: 1,
            actual: args.len(),
        });
    };
    match eval(x, env)? {
        Value::Cons(pair) => Ok(pair.1.clone()),
        _ => Err(LispError::TypeMismatch {
            form: "cdr",
            expected: "cons",
        }),
    }
}

fn eval_cons(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "cons")?;
    let [car_form, cdr_form] = args.as_slice() else {
        return Err(LispError::Arity {
            form: "cons",
            expected: 2,
            actual: args.len(),
        });
    };
    let car = eval(car_form, env)?;
    let cdr = eval(cdr_form, env)?;
    Ok(Value::cons(car, cdr))
}

fn eval_list(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = eval_args(&expr.cdr(), env)?;
    Ok(Value::from_vec(args))
}

fn eval_list_star(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let mut args = eval_args(&expr.cdr(), env)?;
    if args.is_empty() {
        return Ok(Value::Nil);
    }
    let tail = args.pop().expect("checked non-empty");
    Ok(Value::from_vec_dotted(args, tail))
}

fn eval_print(expr: &Value, env: &Env, bare: bool) -> Result<Value, LispError> {
    let args = eval_args(&expr.cdr(), env)?;
    let rendered: Vec<String> = args
        .iter()
        .map(|v| crate::writer::render(v, bare))
        .collect();
    print!("{}", rendered.join(" "));
    use std::io::Write;
    let _ = std::io::stdout().flush();
    Ok(Value::Nil)
}

fn eval_error(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = eval_args(&expr.cdr(), env)?;
    let rendered: Vec<String> = args
        .iter()
        .map(|v| crate::writer::render(v, false))
        .collect();
    Err(LispError::User(rendered.join(" ")))
}

fn eval_apply(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "apply")?;
    let [f_form, xs_form] = args.as_slice() else {
        return Err(LispError::Arity {
            form: "apply",
            expected: 2,
            actual: args.len(),
        });
    };
    let callee = eval(f_form, env)?;
    let arg_list = eval(xs_form, env)?
        .to_vec()
        .ok_or(LispError::TypeMismatch {
            form: "apply",
            expected: "proper list",
        })?;
    invoke_closure(&callee, arg_list)
}

fn eval_binary_numeric(
    expr: &Value,
    env: &Env,
    form: &'static str,
    op: impl Fn(i64, i64) -> Result<Value, LispError>,
) -> Result<Value, LispError> {
    let args = args_of(expr, form)?;
    let [a_form, b_form] = args.as_slice() else {
        return Err(LispError::Arity {
            form,
            expected: 2,
            actual: args.len(),
        });
    };
    let a = eval(a_form, env)?;
    let b = eval(b_form, env)?;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => op(x, y),
        _ => Err(LispError::TypeMismatch {
            form,
            expected: "number",
        }),
    }
}

fn eval_equal(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "=")?;
    let [a_form, b_form] = args.as_slice() else {
        return Err(LispError::Arity {
            form: "=",
            expected: 2,
            actual: args.len(),
        });
    };
    let a = eval(a_form, env)?;
    let b = eval(b_form, env)?;
    match a.lisp_eq(&b) {
        Some(true) => Ok(TRUE),
        Some(false) => Ok(Value::Nil),
        None => Err(LispError::TypeMismatch {
            form: "=",
            expected: "comparable operands",
        }),
    }
}

fn symbol_name(v: &Value, form: &'static str) -> Result<Rc<str>, LispError> {
    match v {
        Value::Symbol(s) => Ok(s.clone()),
        _ => Err(LispError::Malformed(form)),
    }
}

/// Parameter names bound by `params` for free-variable/scope purposes,
/// excluding the `&rest` marker token itself.
fn param_names(params: &Value) -> Vec<Rc<str>> {
    params
        .to_vec()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| match p {
            Value::Symbol(s) if &*s != "&rest" => Some(s),
            _ => None,
        })
        .collect()
}

/// Free-variable analysis per the closure-creation rule: descends into all
/// subforms except `(quote _)`, treating `lambda` and `let` as binders that
/// extend the in-scope list.
pub fn collect_free_vars(expr: &Value, bound: &[Rc<str>], acc: &mut Vec<Rc<str>>) {
    match expr {
        Value::Symbol(s) => {
            if !bound.contains(s) && !is_builtin(s) && !acc.contains(s) {
                acc.push(s.clone());
            }
        }
        Value::Cons(_) => {
            if expr.car().is_symbol_named("quote") {
                return;
            }
            if expr.car().is_symbol_named("lambda") {
                if let Some(items) = expr.to_vec() {
                    if items.len() == 3 {
                        let mut inner_bound = bound.to_vec();
                        inner_bound.extend(param_names(&items[1]));
                        collect_free_vars(&items[2], &inner_bound, acc);
                        return;
                    }
                }
            }
            if expr.car().is_symbol_named("let") {
                if let Some(items) = expr.to_vec() {
                    if items.len() == 3 {
                        if let Some(bindings) = items[1].to_vec() {
                            let mut inner_bound = bound.to_vec();
                            for b in &bindings {
                                if let Some(pair) = b.to_vec() {
                                    if let [Value::Symbol(name), _] = pair.as_slice() {
                                        inner_bound.push(name.clone());
                                    }
                                }
                            }
                            for b in &bindings {
                                if let Some(pair) = b.to_vec() {
                                    if pair.len() == 2 {
                                        collect_free_vars(&pair[1], bound, acc);
                                    }
                                }
                            }
                            collect_free_vars(&items[2], &inner_bound, acc);
                            return;
                        }
                    }
                }
            }
            collect_free_vars(&expr.car(), bound, acc);
            collect_free_vars(&expr.cdr(), bound, acc);
        }
        _ => {}
    }
}

/// Builds a closure value `(lambda fvs params body)` from a parameter list,
/// a body, and the defining environment. Shared by `lambda` evaluation and
/// `defmacro`, which both capture free variables from the environment in
/// effect at definition time.
pub fn build_closure(params: &Value, body: &Value, env: &Env) -> Result<Value, LispError> {
    let bound = param_names(params);
    let mut free = Vec::new();
    collect_free_vars(body, &bound, &mut free);

    let mut fv_entries = Vec::with_capacity(free.len());
    for name in free {
        let value =
            env::lookup(env, &name).ok_or_else(|| LispError::UndefinedSymbol(name.to_string()))?;
        fv_entries.push(Value::cons(Value::Symbol(name), value));
    }

    Ok(Value::from_vec(vec![
        Value::symbol("lambda"),
        Value::from_vec(fv_entries),
        params.clone(),
        body.clone(),
    ]))
}

fn eval_lambda(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let args = args_of(expr, "lambda")?;
    let [params, body] = args.as_slice() else {
        return Err(LispError::Malformed("lambda"));
    };
    build_closure(params, body, env)
}

/// Binds `params` to `args`, honouring the `&rest` convention, and returns
/// the bindings in parameter order (front of the eventual call-frame env).
fn bind_params(
    params: &Value,
    args: &[Value],
    form: &'static str,
) -> Result<Vec<(Rc<str>, Value)>, LispError> {
    let plist = params.to_vec().ok_or(LispError::Malformed(form))?;
    let rest_pos = plist.iter().position(|p| p.is_symbol_named("&rest"));

    if let Some(pos) = rest_pos {
        let fixed = &plist[..pos];
        let rest_name = match plist.get(pos + 1) {
            Some(name) if pos + 2 == plist.len() => symbol_name(name, form)?,
            _ => return Err(LispError::Malformed(form)),
        };
        if args.len() < fixed.len() {
            return Err(LispError::TooFewArgs {
                form,
                expected: fixed.len(),
                actual: args.len(),
            });
        }
        let mut bindings = Vec::with_capacity(fixed.len() + 1);
        for (p, a) in fixed.iter().zip(args.iter()) {
            bindings.push((symbol_name(p, form)?, a.clone()));
        }
        bindings.push((rest_name, Value::from_vec(args[fixed.len()..].to_vec())));
        Ok(bindings)
    } else {
        if args.len() < plist.len() {
            return Err(LispError::TooFewArgs {
                form,
                expected: plist.len(),
                actual: args.len(),
            });
        }
        if args.len() > plist.len() {
            return Err(LispError::TooManyArgs {
                form,
                expected: plist.len(),
                actual: args.len(),
            });
        }
        plist
            .iter()
            .zip(args.iter())
            .map(|(p, a)| Ok((symbol_name(p, form)?, a.clone())))
            .collect()
    }
}

/// Invokes a closure-encoded value `(lambda fvs params body)` with already
/// evaluated arguments — the shared tail of both a direct call and `apply`.
pub fn invoke_closure(callee: &Value, args: Vec<Value>) -> Result<Value, LispError> {
    let parts = callee
        .to_vec()
        .filter(|v| v.len() == 4 && v[0].is_symbol_named("lambda"));
    let parts = parts.ok_or(LispError::NotCallable)?;
    let fvs_form = &parts[1];
    let params = &parts[2];
    let body = &parts[3];

    let fv_bindings: Vec<(Rc<str>, Value)> = fvs_form
        .to_vec()
        .ok_or(LispError::Malformed("closure"))?
        .into_iter()
        .map(|entry| match entry {
            Value::Cons(pair) => match &pair.0 {
                Value::Symbol(name) => Ok((name.clone(), pair.1.clone())),
                _ => Err(LispError::Malformed("closure")),
            },
            _ => Err(LispError::Malformed("closure")),
        })
        .collect::<Result<_, _>>()?;

    let param_bindings = bind_params(params, &args, "closure")?;
    let call_env = env::extend_front(&fv_bindings, param_bindings);
    eval(body, &call_env)
}

fn eval_call(expr: &Value, env: &Env) -> Result<Value, LispError> {
    let callee = eval(&expr.car(), env)?;
    let args = eval_args(&expr.cdr(), env)?;
    invoke_closure(&callee, args)
}
