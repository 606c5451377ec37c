//! Error types for scs-common.

use thiserror::Error;

/// Common error type for low-level reading.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Invalid magic bytes encountered.
    #[error("invalid magic at offset {offset}: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        offset: usize,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// Token text that cannot be packed into 64 bits.
    #[error("invalid token {0:?}: tokens are at most 12 characters of [0-9a-z_]")]
    InvalidToken(String),

    /// UTF-8 decoding error.
    #[error("UTF-8 error at offset {offset}: {source}")]
    Utf8 {
        offset: usize,
        source: std::str::Utf8Error,
    },

    /// Missing null terminator in string.
    #[error("string at offset {0} missing null terminator")]
    MissingNullTerminator(usize),
}

impl Error {
    /// Byte offset at which the error was detected, if it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::UnexpectedEof { offset, .. }
            | Error::InvalidMagic { offset, .. }
            | Error::Utf8 { offset, .. }
            | Error::MissingNullTerminator(offset) => Some(*offset),
            Error::InvalidToken(_) => None,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
