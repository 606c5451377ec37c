//! SCS - game file extraction and decoding for SCS trucking simulators.
//!
//! This crate provides a unified interface to the `scs-*` crates.
//!
//! # Crates
//!
//! - [`scs_common`] - Binary reading, tokens, CityHash64, diagnostics
//! - [`scs_struct`] - Declarative binary layouts and their decoder
//! - [`scs_hashfs`] - HashFS package reading (`.scs`)
//! - [`scs_dds`] - DDS headers and texture decoding
//! - [`scs_formats`] - Prefab, model and sector decoders
//! - [`scs_sii`] - The SII configuration language
//!
//! # Example
//!
//! ```no_run
//! use scs::prelude::*;
//!
//! let archive = HashFsArchive::open("def.scs")?;
//! let entries = archive.parse_entries()?;
//! if let Some(file) = entries.files().get("def/city.sii") {
//!     let mut diagnostics = Diagnostics::new();
//!     let cities: Vec<CityData> = decode_records(&file.read()?, &mut diagnostics)?;
//!     println!("{} cities", cities.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use scs_common as common;
pub use scs_dds as dds;
pub use scs_formats as formats;
pub use scs_hashfs as hashfs;
pub use scs_sii as sii;
pub use scs_struct as structs;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use scs_common::{city::hash_path, BinaryReader, Diagnostics, Token};
    pub use scs_dds::Texture;
    pub use scs_formats::{ModelBounds, PrefabDescription, Sector};
    pub use scs_hashfs::{CompositeEntries, EntryLookup, HashFsArchive};
    pub use scs_sii::{decode_records, parse_sii, SiiRecord};
    pub use scs_sii::{CityData, CompanyPermanent, CountryData, FerryData, LocalizationDb, PrefabModel};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
