//! Tokenizer.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LexError, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Semicolon,
    /// `@include`
    Include,
    Nil,
    /// A quoted string with escapes resolved.
    Str(String),
    /// A decimal literal as written.
    Number(String),
    /// The digits of a `0x` literal.
    Hex(String),
    /// The bits of a `&` literal.
    BinaryFloat(u32),
    Ident(String),
}

impl TokenKind {
    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LBrace => "`{`".into(),
            TokenKind::RBrace => "`}`".into(),
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::LBracket => "`[`".into(),
            TokenKind::RBracket => "`]`".into(),
            TokenKind::Colon => "`:`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::Semicolon => "`;`".into(),
            TokenKind::Include => "`@include`".into(),
            TokenKind::Nil => "`nil`".into(),
            TokenKind::Str(s) => format!("string {s:?}"),
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::Hex(h) => format!("hex literal `0x{h}`"),
            TokenKind::BinaryFloat(bits) => format!("binary float `&{bits:08x}`"),
            TokenKind::Ident(i) => format!("identifier `{i}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Everything the lexer produced; `errors` is empty on success.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("decimal pattern")
});

static MANTISSA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)[eE]$").expect("mantissa pattern"));

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Number, hex literal, `nil` or identifier, by the shape of the whole run.
fn classify(word: &str) -> TokenKind {
    if word == "nil" {
        return TokenKind::Nil;
    }
    if let Some(digits) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return TokenKind::Hex(digits.to_string());
        }
    }
    if DECIMAL.is_match(word) {
        TokenKind::Number(word.to_string())
    } else {
        TokenKind::Ident(word.to_string())
    }
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    out: Lexed,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            out: Lexed::default(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            self.column += 1;
        }
        Some(b)
    }

    fn here(&self) -> Span {
        Span {
            start: self.pos,
            end: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn push(&mut self, kind: TokenKind, mut span: Span) {
        span.end = self.pos;
        self.out.tokens.push(Token { kind, span });
    }

    fn error(&mut self, message: impl Into<String>, mut span: Span) {
        span.end = self.pos.max(span.start);
        self.out.errors.push(LexError {
            message: message.into(),
            span,
        });
    }

    fn run(mut self) -> Lexed {
        while let Some(b) = self.peek() {
            let start = self.here();
            match b {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0C => {
                    self.bump();
                }
                b'#' => self.skip_line(),
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block(start),
                b'{' | b'}' | b'(' | b')' | b'[' | b']' | b':' | b',' | b';' => {
                    self.bump();
                    let kind = match b {
                        b'{' => TokenKind::LBrace,
                        b'}' => TokenKind::RBrace,
                        b'(' => TokenKind::LParen,
                        b')' => TokenKind::RParen,
                        b'[' => TokenKind::LBracket,
                        b']' => TokenKind::RBracket,
                        b':' => TokenKind::Colon,
                        b',' => TokenKind::Comma,
                        _ => TokenKind::Semicolon,
                    };
                    self.push(kind, start);
                }
                b'"' => self.string(start),
                b'&' => self.binary_float(start),
                b'@' => self.directive(start),
                b'+' | b'-'
                    if self
                        .peek_at(1)
                        .is_some_and(|n| n.is_ascii_digit() || n == b'.') =>
                {
                    self.word(start)
                }
                _ if is_word(b) => self.word(start),
                _ => {
                    let ch = self.src[self.pos..].chars().next().unwrap_or('\u{FFFD}');
                    for _ in 0..ch.len_utf8() {
                        self.bump();
                    }
                    self.error(format!("unexpected character {ch:?}"), start);
                }
            }
        }
        self.out
    }

    fn skip_line(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block(&mut self, start: Span) {
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                None => {
                    self.error("unterminated block comment", start);
                    return;
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.bump();
                    self.bump();
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn word(&mut self, start: Span) {
        let from = self.pos;
        self.bump();
        while let Some(b) = self.peek() {
            let exponent_sign = (b == b'+' || b == b'-')
                && MANTISSA.is_match(&self.src[from..self.pos])
                && self.peek_at(1).is_some_and(|n| n.is_ascii_digit());
            if !(is_word(b) || exponent_sign) {
                break;
            }
            self.bump();
        }
        let word = &self.src[from..self.pos];
        if word.starts_with(['+', '-']) && !DECIMAL.is_match(word) {
            self.error(format!("malformed number `{word}`"), start);
            return;
        }
        let kind = classify(word);
        self.push(kind, start);
    }

    fn string(&mut self, start: Span) {
        self.bump();
        let mut value = Vec::new();
        loop {
            match self.bump() {
                None => {
                    self.error("unterminated string", start);
                    return;
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => value.push(b'\n'),
                    Some(b't') => value.push(b'\t'),
                    Some(b'r') => value.push(b'\r'),
                    Some(other) => value.push(other),
                    None => {
                        self.error("unterminated string", start);
                        return;
                    }
                },
                Some(b) => value.push(b),
            }
        }
        let text = String::from_utf8_lossy(&value).into_owned();
        self.push(TokenKind::Str(text), start);
    }

    fn binary_float(&mut self, start: Span) {
        self.bump();
        let from = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.bump();
        }
        let digits = &self.src[from..self.pos];
        match u32::from_str_radix(digits, 16) {
            Ok(bits) if digits.len() == 8 => self.push(TokenKind::BinaryFloat(bits), start),
            _ => self.error(
                format!("binary float needs 8 hex digits, got `&{digits}`"),
                start,
            ),
        }
    }

    fn directive(&mut self, start: Span) {
        self.bump();
        let from = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.bump();
        }
        let name = &self.src[from..self.pos];
        if name == "include" {
            self.push(TokenKind::Include, start);
        } else {
            self.error(format!("unknown directive `@{name}`"), start);
        }
    }
}

/// Split `src` into tokens, collecting every lexical error.
pub fn tokenize(src: &str) -> Lexed {
    Lexer::new(src).run()
}
