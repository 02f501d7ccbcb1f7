// ABOUTME: Error types for read and evaluation failures (§7 of the design)

use thiserror::Error;

/// The two non-fatal failure classes from §7: read errors and evaluation
/// errors. Both produce the `Value::Error` sentinel when they need to flow
/// as a value (e.g. for the REPL to print); the `LispError` itself carries
/// the human-readable line delivered to the diagnostics sink (`log::error!`
/// at the call site — see `eval`/`expand`/`process_top`).
///
/// Fatal invariant violations (§7.3 — structural corruption that should be
/// impossible) are not represented here; they use `panic!` directly so the
/// message carries `file!()`/`line!()` of the offending site.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LispError {
    #[error("Failed to read s-expression: {0}")]
    Read(String),

    #[error("Symbol {0} not bound in scope")]
    UndefinedSymbol(String),

    #[error("{form}: expected {expected} argument{}, got {actual}", if *expected == 1 { "" } else { "s" })]
    Arity {
        form: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{form}: too few arguments, expected {expected}, got {actual}")]
    TooFewArgs {
        form: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{form}: too many arguments, expected {expected}, got {actual}")]
    TooManyArgs {
        form: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{form}: expected {expected}")]
    TypeMismatch {
        form: &'static str,
        expected: &'static str,
    },

    #[error("{0}: malformed special form")]
    Malformed(&'static str),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("{0} can be used only at the top level")]
    TopLevelOnly(&'static str),

    #[error("Value is not callable")]
    NotCallable,

    #[error("{0}")]
    User(String),

    #[error("Cannot include {path}: {message}")]
    Include { path: String, message: String },
}
