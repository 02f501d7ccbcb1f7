// ABOUTME: Environment module — the flat association list used for both env and menv

use crate::value::Value;
use std::rc::Rc;

/// A single `(symbol . value)` entry.
pub type Binding = (Rc<str>, Value);

/// A flat association list: `((sym . value) ...)`. The first matching entry
/// wins on lookup; later entries are effectively shadowed. Closures snapshot
/// their free variables into one of these (owned, independent of the
/// defining scope's lifetime), and `let`/lambda calls build a fresh one by
/// prepending new bindings in front of the captured/outer one.
pub type Env = Vec<Binding>;

/// Walks `env` front-to-back, returning the first binding whose name
/// matches.
pub fn lookup(env: &Env, name: &str) -> Option<Value> {
    env.iter().find(|(s, _)| &**s == name).map(|(_, v)| v.clone())
}

/// Builds a new environment with `bindings` prepended in front of `env`,
/// shadowing any entry they share a name with.
pub fn extend_front(env: &Env, bindings: Vec<Binding>) -> Env {
    let mut combined = bindings;
    combined.extend(env.iter().cloned());
    combined
}

/// Top-level `define` semantics (the resolved Open Question, see
/// DESIGN.md): if `name` is already bound, its value is replaced in place;
/// otherwise a new binding is added at the front.
pub fn define(env: &mut Env, name: Rc<str>, value: Value) {
    if let Some(slot) = env.iter_mut().find(|(s, _)| *s == name) {
        slot.1 = value;
    } else {
        env.insert(0, (name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_first_match() {
        let env: Env = vec![
            (Rc::from("x"), Value::Number(1)),
            (Rc::from("x"), Value::Number(2)),
        ];
        assert_eq!(lookup(&env, "x"), Some(Value::Number(1)));
    }

    #[test]
    fn lookup_missing_is_none() {
        let env: Env = vec![];
        assert_eq!(lookup(&env, "x"), None);
    }

    #[test]
    fn extend_front_shadows_outer_binding() {
        let outer: Env = vec![(Rc::from("x"), Value::Number(1))];
        let inner = extend_front(&outer, vec![(Rc::from("x"), Value::Number(2))]);
        assert_eq!(lookup(&inner, "x"), Some(Value::Number(2)));
        assert_eq!(lookup(&outer, "x"), Some(Value::Number(1)));
    }

    #[test]
    fn define_updates_existing_binding_in_place() {
        let mut env: Env = vec![(Rc::from("a"), Value::Number(1))];
        define(&mut env, Rc::from("a"), Value::Number(2));
        assert_eq!(env.len(), 1);
        assert_eq!(lookup(&env, "a"), Some(Value::Number(2)));
    }

    #[test]
    fn define_adds_new_binding() {
        let mut env: Env = vec![];
        define(&mut env, Rc::from("a"), Value::Number(1));
        assert_eq!(lookup(&env, "a"), Some(Value::Number(1)));
    }
}
