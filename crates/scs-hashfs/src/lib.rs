//! HashFS package reader for SCS trucking-simulation game files.
//!
//! Game data ships in `.scs` packages: a header, a table of entries keyed by
//! the CityHash64 of their path, a metadata table describing each payload,
//! and the payloads themselves (stored, zlib or GDEFLATE compressed). This
//! crate supports:
//!
//! - HashFS v2 headers, entry and metadata tables (optionally zlib-compressed)
//! - Directory listings and plain files
//! - Texture objects, rebuilt into standalone DDS files on read
//! - GDEFLATE payloads, decoded by `GDeflateDecoder` when the `gdeflate`
//!   feature is on (the default) or by any other [`TileStreamDecoder`]
//! - Merging base game and DLC packages with [`CompositeEntries`]
//!
//! # Example
//!
//! ```no_run
//! use scs_hashfs::HashFsArchive;
//!
//! let archive = HashFsArchive::open("def.scs")?;
//! if archive.is_valid() {
//!     let entries = archive.parse_entries()?;
//!     if let Some(dir) = entries.directories().get("def") {
//!         println!("{} files", dir.files.len());
//!     }
//!     if let Some(file) = entries.files().get("def/city.sii") {
//!         let text = file.read_to_string()?;
//!         println!("{text}");
//!     }
//! }
//! archive.dispose();
//! # Ok::<(), scs_hashfs::Error>(())
//! ```

mod archive;
mod composite;
mod decompress;
mod entry;
mod error;
#[cfg(feature = "gdeflate")]
mod gdeflate;
mod options;
pub mod schema;
mod tobj;

#[cfg(test)]
pub(crate) mod fixture;

pub use archive::HashFsArchive;
pub use composite::{CompositeDirectories, CompositeEntries, CompositeFiles};
pub use decompress::TILE_STREAM_HEADER_SIZE;
pub use entry::{
    join_path, list_files, Directories, DirectoryEntry, Entries, EntryLookup, FileEntry,
    FileInfo, FileKind, Files,
};
pub use error::{Error, Result};
#[cfg(feature = "gdeflate")]
pub use gdeflate::GDeflateDecoder;
pub use options::{Compression, ReaderOptions, TileStreamDecoder};
