//! Error types for the HashFS crate.

use thiserror::Error;

use crate::Compression;

/// Errors that can occur when working with HashFS packages.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] scs_common::Error),

    /// A record did not match its declared layout.
    #[error("{0}")]
    Decode(#[from] scs_struct::DecodeError),

    /// An entry whose metadata records disagree with its declared kind.
    #[error("entry {hash:016x}: {source}")]
    Entry {
        hash: u64,
        #[source]
        source: scs_struct::DecodeError,
    },

    /// Bad magic, version, or an unexpected top-level shape.
    #[error("invalid package: {0}")]
    Format(String),

    /// A metadata header with a type tag outside the recognised set.
    #[error("unknown metadata type {tag:#04x} on entry {hash:016x}")]
    UnknownMetadataType { tag: u8, hash: u64 },

    /// A payload codec that has no decoder.
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(Compression),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// The package was disposed before this operation.
    #[error("package has been disposed")]
    Disposed,
}

/// Result type for HashFS operations.
pub type Result<T> = std::result::Result<T, Error>;
