// ABOUTME: Version and REPL banner text for the command-line front-end

pub const VERSION: &str = "0.1.0";
pub const WELCOME_MESSAGE: &str = "schemeful 0.1.0";
pub const WELCOME_SUBTITLE: &str = "A tree-walking Scheme-flavored Lisp interpreter";
