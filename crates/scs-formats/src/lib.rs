//! Binary format decoders for SCS game data.
//!
//! Every format is declared as an [`scs_struct::Layout`] and converted into
//! typed structs:
//!
//! - [`prefab`] - prefab descriptors (`.ppd`, versions 23 and 24)
//! - [`model`] - model header bounds (`.pmg`)
//! - [`sector`] - map sector items and nodes (`.base`)
//!
//! # Example
//!
//! ```no_run
//! use scs_common::Diagnostics;
//! use scs_formats::PrefabDescription;
//!
//! let data = std::fs::read("prefab/cross.ppd").unwrap();
//! let mut diagnostics = Diagnostics::new();
//! let prefab = PrefabDescription::parse(&data, &mut diagnostics)?;
//! println!("{} map points", prefab.map_points.len());
//! # Ok::<(), scs_formats::Error>(())
//! ```

mod error;
pub mod model;
pub mod prefab;
pub mod sector;

pub use error::{Error, Result};
pub use model::{ModelBounds, ModelHeader};
pub use prefab::{LaneCount, MapPoint, MapPointKind, PolygonColour, PrefabDescription, RoadPoint};
pub use sector::{Item, ItemKind, Node, Sector};

use scs_struct::{DecodeError, Record, Value};

/// The struct a top-level layout decodes to.
pub(crate) fn record(value: &Value) -> scs_struct::Result<&Record> {
    value
        .as_record()
        .ok_or_else(|| DecodeError::type_mismatch(0, "record", "a struct"))
}
