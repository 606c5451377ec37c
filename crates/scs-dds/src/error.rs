//! DDS error type.

use thiserror::Error;

/// Failures while reading or decoding a DDS file.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] scs_common::Error),

    /// The file does not start with `DDS `.
    #[error("not a DDS file: magic is {0:?}")]
    InvalidMagic([u8; 4]),

    /// A header field holds a value no writer produces.
    #[error("malformed DDS header: {0}")]
    InvalidHeader(String),

    /// No decode path exists for this pixel format.
    #[error("no decoder for pixel format {0}")]
    UnsupportedFormat(String),

    /// The surface holds fewer bytes than width, height and format require.
    #[error("surface data truncated: need {expected} bytes, have {actual}")]
    SurfaceTooShort { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
