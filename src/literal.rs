//! Restricted literal-expression parser.
//!
//! Only data literals are accepted: `None`, `True`, `False`, integers,
//! floats, quoted strings, lists and string-keyed mappings. Names, calls and
//! operators other than a leading sign on a number are rejected, so a value
//! read from a configuration file can never do more than describe data.

use crate::value::Value;
use indexmap::IndexMap;
use thiserror::Error;

/// Maximum nesting of lists and mappings.
pub const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralError {
    #[error("empty literal")]
    Empty,
    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    #[error("integer '{text}' does not fit in 64 bits")]
    IntegerOverflow { text: String },
    #[error("unknown name '{name}' at offset {offset}")]
    UnknownName { name: String, offset: usize },
    #[error("mapping key at offset {offset} is not a string")]
    NonStringKey { offset: usize },
    #[error("unexpected trailing input at offset {offset}")]
    TrailingInput { offset: usize },
    #[error("nesting deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Parse a complete literal. Surrounding whitespace is ignored; anything
/// else left over after the literal is an error.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    if text.trim().is_empty() {
        return Err(LiteralError::Empty);
    }

    let mut parser = Parser::new(text);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < text.len() {
        return Err(LiteralError::TrailingInput { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self, expected: &'static str) -> LiteralError {
        match self.peek() {
            Some(found) => LiteralError::Unexpected {
                found,
                offset: self.pos,
            },
            None => LiteralError::UnexpectedEnd { expected },
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd { expected: "a value" }),
            Some('[') => self.nested(Self::parse_list),
            Some('{') => self.nested(Self::parse_map),
            Some('\'') | Some('"') => self.parse_strings().map(Value::Str),
            Some(c) if c.is_ascii_digit() || c == '.' || c == '+' || c == '-' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_name(),
            Some(found) => Err(LiteralError::Unexpected {
                found,
                offset: self.pos,
            }),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_list(&mut self) -> Result<Value, LiteralError> {
        self.bump(); // '['
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(Value::List(items));
            }

            items.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    return Ok(Value::List(items));
                }
                _ => return Err(self.unexpected("',' or ']'")),
            }
        }
    }

    fn parse_map(&mut self) -> Result<Value, LiteralError> {
        self.bump(); // '{'
        let mut map = IndexMap::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Map(map));
            }

            let key_offset = self.pos;
            let key = match self.parse_value()? {
                Value::Str(key) => key,
                _ => return Err(LiteralError::NonStringKey { offset: key_offset }),
            };

            self.skip_whitespace();
            if self.peek() != Some(':') {
                return Err(self.unexpected("':'"));
            }
            self.bump();

            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(Value::Map(map));
                }
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
    }

    /// One or more adjacent quoted strings, concatenated.
    fn parse_strings(&mut self) -> Result<String, LiteralError> {
        let mut out = self.parse_string()?;
        loop {
            let save = self.pos;
            self.skip_whitespace();
            match self.peek() {
                Some('\'') | Some('"') => out.push_str(&self.parse_string()?),
                _ => {
                    self.pos = save;
                    return Ok(out);
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd {
            expected: "a string",
        })?;
        let mut out = String::new();

        loop {
            let c = self
                .bump()
                .ok_or(LiteralError::UnterminatedString { offset: start })?;
            match c {
                c if c == quote => return Ok(out),
                '\n' => return Err(LiteralError::UnterminatedString { offset: start }),
                '\\' => self.parse_escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let offset = self.pos - 1;
        let c = self.bump().ok_or(LiteralError::InvalidEscape { offset })?;
        match c {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            'x' => out.push(self.hex_escape(2, offset)?),
            'u' => out.push(self.hex_escape(4, offset)?),
            'U' => out.push(self.hex_escape(8, offset)?),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or(LiteralError::InvalidEscape { offset })?);
            }
            // unknown escapes are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize, offset: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or(LiteralError::InvalidEscape { offset })?;
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { offset })
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            }
            Some('+') => {
                self.bump();
                false
            }
            _ => false,
        };
        self.skip_whitespace();

        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '.' => {}
            _ => return Err(self.unexpected("a number")),
        }

        let radix = match (self.peek(), self.peek_nth(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };

        if let Some(radix) = radix {
            self.bump();
            self.bump();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let text = &self.src[start..self.pos];
            let digits = &self.src[digits_start..self.pos];
            if digits.is_empty() || !valid_underscores(digits, |c| c.is_digit(radix)) {
                return Err(self.invalid_number(start));
            }
            let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
            let magnitude = i128::from_str_radix(&cleaned, radix).map_err(|_| {
                if cleaned.chars().all(|c| c.is_digit(radix)) {
                    LiteralError::IntegerOverflow {
                        text: text.to_string(),
                    }
                } else {
                    self.invalid_number(start)
                }
            })?;
            return signed_int(magnitude, negative, text);
        }

        let mut is_float = false;
        self.take_digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            self.take_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            self.take_digits();
        }

        let text = &self.src[start..self.pos];
        let valid = text
            .split(|c: char| c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-')
            .all(|group| valid_underscores(group, |c| c.is_ascii_digit()));
        if !valid {
            return Err(self.invalid_number(start));
        }
        let cleaned: String = text.chars().filter(|c| *c != '_').collect();

        if is_float {
            let x: f64 = cleaned.parse().map_err(|_| self.invalid_number(start))?;
            return Ok(Value::Float(if negative { -x } else { x }));
        }

        // decimal integers may not carry leading zeros
        if cleaned.len() > 1 && cleaned.starts_with('0') && cleaned.chars().any(|c| c != '0') {
            return Err(self.invalid_number(start));
        }
        let magnitude: i128 = cleaned.parse().map_err(|_| LiteralError::IntegerOverflow {
            text: text.to_string(),
        })?;
        signed_int(magnitude, negative, text)
    }

    fn take_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn invalid_number(&self, start: usize) -> LiteralError {
        LiteralError::InvalidNumber {
            text: self.src[start..self.pos].to_string(),
            offset: start,
        }
    }

    fn parse_name(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" => Ok(Value::None),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            name => Err(LiteralError::UnknownName {
                name: name.to_string(),
                offset: start,
            }),
        }
    }
}

/// Underscores may only sit between two digits. Empty groups are allowed
/// here; the numeric parse rejects them where they matter.
fn valid_underscores(group: &str, is_digit: impl Fn(char) -> bool) -> bool {
    let chars: Vec<char> = group.chars().collect();
    chars.iter().enumerate().all(|(i, c)| match c {
        '_' => {
            i > 0
                && i + 1 < chars.len()
                && is_digit(chars[i - 1])
                && is_digit(chars[i + 1])
        }
        c => is_digit(*c),
    })
}

fn signed_int(magnitude: i128, negative: bool, text: &str) -> Result<Value, LiteralError> {
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value)
        .map(Value::Int)
        .map_err(|_| LiteralError::IntegerOverflow {
            text: text.to_string(),
        })
}
