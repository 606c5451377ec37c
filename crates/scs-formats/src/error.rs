//! Error types for the format decoders.

use thiserror::Error;

/// Errors that can occur when decoding prefab, model or sector files.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] scs_common::Error),

    /// The buffer did not match its declared layout.
    #[error("{0}")]
    Decode(#[from] scs_struct::DecodeError),

    /// A format version this crate has no layout for.
    #[error("unsupported {format} version {version}")]
    UnsupportedVersion { format: &'static str, version: u32 },
}

/// Result type for format decoders.
pub type Result<T> = std::result::Result<T, Error>;
