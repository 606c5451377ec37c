//! Decode errors.

use std::fmt;

use thiserror::Error;

/// What went wrong while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Ran out of bytes.
    Eof { needed: usize, available: usize },
    /// A versioned layout saw a tag it has no variant for.
    UnknownVariant { tag: u64 },
    /// A length, offset, or predicate referred to a field that was not decoded.
    MissingField { name: &'static str },
    /// A field had a different shape than its consumer expected.
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
    },
    /// A pointer resolved outside the buffer.
    OffsetOutOfBounds { target: u64 },
    /// A string field was not valid UTF-8.
    InvalidUtf8,
    /// Magic bytes did not match.
    InvalidMagic { expected: Vec<u8>, actual: Vec<u8> },
    /// A token could not be packed or unpacked.
    InvalidToken(String),
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Eof { needed, available } => {
                write!(f, "needed {needed} bytes but only {available} available")
            }
            DecodeErrorKind::UnknownVariant { tag } => write!(f, "unknown variant tag {tag}"),
            DecodeErrorKind::MissingField { name } => write!(f, "missing field `{name}`"),
            DecodeErrorKind::TypeMismatch { name, expected } => {
                write!(f, "field `{name}` is not {expected}")
            }
            DecodeErrorKind::OffsetOutOfBounds { target } => {
                write!(f, "pointer target {target} is out of bounds")
            }
            DecodeErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8 in string"),
            DecodeErrorKind::InvalidMagic { expected, actual } => {
                write!(f, "invalid magic: expected {expected:?}, got {actual:?}")
            }
            DecodeErrorKind::InvalidToken(text) => write!(f, "invalid token {text:?}"),
        }
    }
}

/// A decode failure at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode error at offset {offset}: {kind}")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }

    /// Shorthand for an unknown versioned tag.
    pub fn unknown_variant(offset: usize, tag: u64) -> Self {
        Self::new(offset, DecodeErrorKind::UnknownVariant { tag })
    }

    pub fn missing_field(offset: usize, name: &'static str) -> Self {
        Self::new(offset, DecodeErrorKind::MissingField { name })
    }

    pub fn type_mismatch(offset: usize, name: &'static str, expected: &'static str) -> Self {
        Self::new(offset, DecodeErrorKind::TypeMismatch { name, expected })
    }
}

impl From<scs_common::Error> for DecodeError {
    fn from(err: scs_common::Error) -> Self {
        let offset = err.offset().unwrap_or(0);
        let kind = match err {
            scs_common::Error::UnexpectedEof {
                needed, available, ..
            } => DecodeErrorKind::Eof { needed, available },
            scs_common::Error::InvalidMagic {
                expected, actual, ..
            } => DecodeErrorKind::InvalidMagic { expected, actual },
            scs_common::Error::InvalidToken(text) => DecodeErrorKind::InvalidToken(text),
            scs_common::Error::Utf8 { .. } => DecodeErrorKind::InvalidUtf8,
            scs_common::Error::MissingNullTerminator(_) => DecodeErrorKind::Eof {
                needed: 1,
                available: 0,
            },
        };
        Self { offset, kind }
    }
}

/// Result type for decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;
