//! Error types for the SII front end.

use std::fmt;

use thiserror::Error;

/// A region of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Span {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// 1-based line of `start`.
    pub line: u32,
    /// 1-based column of `start`.
    pub column: u32,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Text that does not form a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{span}: {message}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

/// Tokens that do not form a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{span}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// One failed schema check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Violation {
    /// Where in the record, e.g. `city.berlin.cityName`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found while validating one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Violations(pub Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.0.len())?;
        for violation in &self.0 {
            write!(f, "\n  {violation}")?;
        }
        Ok(())
    }
}

/// Errors that can occur when reading SII files.
#[derive(Debug, Error)]
pub enum Error {
    /// The text could not be tokenized.
    #[error("lex error at {0}")]
    Lex(#[from] LexError),

    /// The tokens did not parse.
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    /// The document parsed but does not have the declared shape.
    #[error("schema validation failed: {0}")]
    SchemaValidation(Violations),

    /// An obfuscated buffer was too short or malformed.
    #[error("cannot decrypt: {0}")]
    Decrypt(String),
}

/// Result type for SII operations.
pub type Result<T> = std::result::Result<T, Error>;
