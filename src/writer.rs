// ABOUTME: Writer module rendering values back to characters (inverse of the reader)

use crate::value::Value;
use std::fmt;

/// Renders `value` the way the reader would need to re-read it, except in
/// `bare` mode where strings are emitted without their surrounding quotes
/// (used by `display`).
///
/// Mirrors `any_sexp_write`: `(quote x)` is special-cased to `'x`, and a
/// dotted tail is rendered with a single ` . ` separator before the final
/// element.
pub fn render(value: &Value, bare: bool) -> String {
    let mut out = String::new();
    write_into(&mut out, value, bare).expect("String writes are infallible");
    out
}

fn write_into(out: &mut String, value: &Value, bare: bool) -> fmt::Result {
    use fmt::Write;

    match value {
        Value::Error => out.write_str("<error>"),
        Value::Nil => out.write_str("()"),
        Value::Number(n) => write!(out, "{n}"),
        Value::Symbol(s) => out.write_str(s),
        Value::Str(s) => {
            if bare {
                out.write_str(s)
            } else {
                write!(out, "\"{s}\"")
            }
        }
        Value::Cons(pair) => {
            if let (car, Value::Cons(tail)) = (&pair.0, &pair.1) {
                if car.is_symbol_named("quote") && tail.1.is_nil() {
                    out.write_char('\'')?;
                    return write_into(out, &tail.0, bare);
                }
            }

            out.write_char('(')?;
            let mut car = &pair.0;
            let mut cdr = &pair.1;
            loop {
                write_into(out, car, bare)?;
                match cdr {
                    Value::Cons(next) => {
                        out.write_char(' ')?;
                        car = &next.0;
                        cdr = &next.1;
                    }
                    Value::Nil => break,
                    other => {
                        out.write_str(" . ")?;
                        write_into(out, other, bare)?;
                        break;
                    }
                }
            }
            out.write_char(')')
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nil_and_numbers() {
        assert_eq!(render(&Value::Nil, false), "()");
        assert_eq!(render(&Value::Number(-7), false), "-7");
    }

    #[test]
    fn renders_quote_sugar() {
        let quoted = Value::from_vec(vec![Value::symbol("quote"), Value::symbol("x")]);
        assert_eq!(render(&quoted, false), "'x");
    }

    #[test]
    fn renders_proper_list() {
        let list = Value::from_vec(vec![Value::Number(1), Value::Number(2), Value::Number(3)]);
        assert_eq!(render(&list, false), "(1 2 3)");
    }

    #[test]
    fn renders_dotted_tail() {
        let dotted = Value::cons(Value::Number(1), Value::Number(2));
        assert_eq!(render(&dotted, false), "(1 . 2)");
    }

    #[test]
    fn bare_mode_strips_string_quotes() {
        let s = Value::string("hi");
        assert_eq!(render(&s, false), "\"hi\"");
        assert_eq!(render(&s, true), "hi");
    }

    #[test]
    fn nested_list_renders_recursively() {
        let inner = Value::from_vec(vec![Value::Number(2), Value::Number(3)]);
        let outer = Value::from_vec(vec![Value::Number(1), inner, Value::Number(4)]);
        assert_eq!(render(&outer, false), "(1 (2 3) 4)");
    }
}
