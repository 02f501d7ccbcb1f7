// ABOUTME: Reader module — tokenises and parses a character stream into values

use crate::error::LispError;
use crate::value::Value;
use std::io;

/// A character source: "a function that returns the next character or
/// end-of-stream" per §4.1. Bytes rather than full UTF-8 decoding, matching
/// the "opaque byte string" treatment of `Value::Str`.
pub trait CharSource {
    fn next_char(&mut self) -> Option<char>;
}

/// Reads from an in-memory string — used for REPL lines and `include`d
/// source already slurped into memory.
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    pub fn new(source: &'a str) -> Self {
        StrSource {
            chars: source.chars(),
        }
    }
}

impl CharSource for StrSource<'_> {
    fn next_char(&mut self) -> Option<char> {
        self.chars.next()
    }
}

/// Reads from any byte stream (a file, stdin).
pub struct ReadSource<R: io::Read> {
    bytes: io::Bytes<R>,
}

impl<R: io::Read> ReadSource<R> {
    pub fn new(reader: R) -> Self {
        ReadSource {
            bytes: reader.bytes(),
        }
    }
}

impl<R: io::Read> CharSource for ReadSource<R> {
    fn next_char(&mut self) -> Option<char> {
        self.bytes.next().and_then(Result::ok).map(|b| b as char)
    }
}

/// Tokenises and parses a character source into values, one expression per
/// call to `read`, holding a one-character lookahead buffer the way the
/// original reader does.
pub struct Reader<S: CharSource> {
    source: S,
    lookahead: Option<char>,
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '\'' | ';')
}

impl<S: CharSource> Reader<S> {
    pub fn new(mut source: S) -> Self {
        let lookahead = source.next_char();
        Reader { source, lookahead }
    }

    /// True once the lookahead buffer is exhausted.
    pub fn at_end(&self) -> bool {
        self.lookahead.is_none()
    }

    fn advance(&mut self) -> Option<char> {
        let current = self.lookahead;
        self.lookahead = self.source.next_char();
        current
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.lookahead {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some(';') => {
                    while let Some(c) = self.lookahead {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Reads the next top-level expression.
    ///
    /// `Ok(None)` means the stream ended cleanly before any token started
    /// (normal termination, per §4.1's error-handling rule); `Err` means a
    /// token started but could not be completed.
    pub fn read(&mut self) -> Result<Option<Value>, LispError> {
        self.skip_ws_and_comments();
        if self.at_end() {
            return Ok(None);
        }
        self.read_expr().map(Some)
    }

    fn read_expr(&mut self) -> Result<Value, LispError> {
        self.skip_ws_and_comments();
        match self.lookahead {
            None => Err(LispError::Read("unexpected end of input".into())),
            Some('(') => self.read_list(),
            Some(')') => Err(LispError::Read("unexpected ')'".into())),
            Some('"') => self.read_string(),
            Some('\'') => {
                self.advance();
                let quoted = self.read_expr()?;
                Ok(Value::from_vec(vec![Value::symbol("quote"), quoted]))
            }
            Some(_) => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> Result<Value, LispError> {
        self.advance();
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments();
            match self.lookahead {
                None => return Err(LispError::Read("unterminated list".into())),
                Some(')') => {
                    self.advance();
                    break;
                }
                _ => items.push(self.read_expr()?),
            }
        }
        Ok(Value::from_vec(items))
    }

    /// A backslash suppresses the closing-quote check for the character that
    /// follows it; the payload stores both the backslash and that character
    /// verbatim, so a round-tripped `"\""` stays `"\""` rather than losing
    /// its escape on write-back.
    fn read_string(&mut self) -> Result<Value, LispError> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.lookahead {
                None => return Err(LispError::Read("unterminated string".into())),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    text.push('\\');
                    self.advance();
                    match self.advance() {
                        None => return Err(LispError::Read("unterminated string".into())),
                        Some(escaped) => text.push(escaped),
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        Ok(Value::string(text))
    }

    fn read_atom(&mut self) -> Result<Value, LispError> {
        let mut buf = String::new();
        while let Some(c) = self.lookahead {
            if !is_symbol_char(c) {
                break;
            }
            buf.push(c);
            self.advance();
        }

        if buf.is_empty() {
            return Err(LispError::Read(format!(
                "unexpected character '{}'",
                self.lookahead.unwrap_or(' ')
            )));
        }

        Ok(classify_atom(&buf))
    }
}

/// `nil` is the one reserved atom spelling: it reads directly to the empty
/// list rather than a symbol, so source text can name the false/empty value
/// without going through `'()`.
fn classify_atom(buf: &str) -> Value {
    if buf == "nil" {
        return Value::Nil;
    }

    let chars: Vec<char> = buf.chars().collect();
    let first = chars[0];
    let rest = &chars[1..];
    let starts_numeric = first == '-' || first.is_ascii_digit();
    let rest_is_digits = rest.iter().all(|c| c.is_ascii_digit());
    let bare_minus = first == '-' && rest.is_empty();

    if starts_numeric && rest_is_digits && !bare_minus {
        match buf.parse() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Number(if first == '-' { i64::MIN } else { i64::MAX }),
        }
    } else {
        Value::symbol(buf)
    }
}

/// Convenience entry point for reading a single expression out of a string.
pub fn read_one(source: &str) -> Result<Option<Value>, LispError> {
    Reader::new(StrSource::new(source)).read()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Value {
        read_one(source).unwrap().unwrap()
    }

    #[test]
    fn reads_numbers_and_bare_minus() {
        assert_eq!(read("42"), Value::Number(42));
        assert_eq!(read("-42"), Value::Number(-42));
        assert_eq!(read("-"), Value::symbol("-"));
    }

    #[test]
    fn oversized_number_literal_saturates_instead_of_panicking() {
        assert_eq!(read("99999999999999999999"), Value::Number(i64::MAX));
        assert_eq!(read("-99999999999999999999"), Value::Number(i64::MIN));
    }

    #[test]
    fn string_escapes_round_trip_through_read_and_render() {
        let v = read(r#""say \"hi\"""#);
        assert_eq!(crate::writer::render(&v, false), r#""say \"hi\"""#);
    }

    #[test]
    fn reads_literal_nil_as_the_empty_list() {
        assert_eq!(read("nil"), Value::Nil);
        assert_eq!(read("()"), Value::Nil);
    }

    #[test]
    fn reads_symbols() {
        assert_eq!(read("foo-bar?"), Value::symbol("foo-bar?"));
        assert_eq!(read("+"), Value::symbol("+"));
    }

    #[test]
    fn reads_strings_with_escapes() {
        // The backslash is retained verbatim in the payload; it only
        // suppresses the closing-quote check, it is not itself consumed.
        assert_eq!(read(r#""say \"hi\"""#), Value::string(r#"say \"hi\""#));
        assert_eq!(read(r#""back\\slash""#), Value::string(r"back\\slash"));
    }

    #[test]
    fn reads_lists() {
        let v = read("(1 2 3)");
        assert_eq!(
            v.to_vec().unwrap(),
            vec![Value::Number(1), Value::Number(2), Value::Number(3)]
        );
    }

    #[test]
    fn reads_quote_sugar() {
        let v = read("'x");
        assert_eq!(
            v.to_vec().unwrap(),
            vec![Value::symbol("quote"), Value::symbol("x")]
        );
    }

    #[test]
    fn skips_comments() {
        let v = read("; a comment\n42");
        assert_eq!(v, Value::Number(42));
    }

    #[test]
    fn clean_eof_before_token_is_none() {
        assert_eq!(read_one("   ").unwrap(), None);
        assert_eq!(read_one("").unwrap(), None);
    }

    #[test]
    fn unmatched_close_paren_is_error() {
        assert!(read_one(")").is_err());
    }

    #[test]
    fn unclosed_list_is_error() {
        assert!(read_one("(1 2").is_err());
    }

    #[test]
    fn successive_reads_yield_successive_expressions() {
        let mut reader = Reader::new(StrSource::new("1 2 3"));
        assert_eq!(reader.read().unwrap(), Some(Value::Number(1)));
        assert_eq!(reader.read().unwrap(), Some(Value::Number(2)));
        assert_eq!(reader.read().unwrap(), Some(Value::Number(3)));
        assert_eq!(reader.read().unwrap(), None);
    }
}
