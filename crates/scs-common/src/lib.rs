//! Common utilities for SCS game files.
//!
//! This crate provides foundational types used across all `scs-*` crates:
//!
//! - [`BinaryReader`] - Zero-copy little/big-endian reading from byte slices
//! - [`city`] - CityHash64, the path hash used by HashFS archives
//! - [`Token`] - The base-38 packed identifier used throughout game data
//! - [`Diagnostics`] - An explicit sink for non-fatal decode warnings

mod diagnostics;
mod error;
mod reader;
mod token;

pub mod city;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use token::Token;

/// Re-export memchr for byte searching
pub use memchr;
