//! Model geometry headers (`.pmg`).
//!
//! Only the header is decoded: map building needs a model's footprint, not
//! its meshes.

use std::sync::LazyLock;

use scs_struct::dsl::*;
use scs_struct::{DecodeErrorKind, Layout, Prim, Schema, Value};

use crate::{Error, Result};

pub const MAGIC: &[u8; 3] = b"Pmg";

/// Header versions with a known layout.
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u8> = 0x15..=0x16;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelHeader {
    pub version: u8,
    pub piece_count: u32,
    pub part_count: u32,
    pub bone_count: u32,
    pub weight_width: i32,
    pub locator_count: u32,
    pub skeleton_hash: u64,
    pub bbox_center: [f32; 3],
    pub bbox_diagonal: f32,
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
}

impl Schema for ModelHeader {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            let body = || {
                vec![
                    field("piece_count", u32()),
                    field("part_count", u32()),
                    field("bone_count", u32()),
                    field("weight_width", i32()),
                    field("locator_count", u32()),
                    field("skeleton_hash", u64()),
                    field("bbox_center", floats(3)),
                    field("bbox_diagonal", f32()),
                    field("bbox_min", floats(3)),
                    field("bbox_max", floats(3)),
                ]
            };
            versioned(
                Prim::U8,
                vec![field("magic", magic(MAGIC))],
                SUPPORTED_VERSIONS
                    .map(|v| variant(v as u64, "pmg", body()))
                    .collect(),
            )
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let variant = value.as_variant().ok_or_else(|| {
            scs_struct::DecodeError::type_mismatch(0, "model", "a versioned struct")
        })?;
        let r = &variant.record;
        Ok(Self {
            version: variant.tag as u8,
            piece_count: r.u32("piece_count")?,
            part_count: r.u32("part_count")?,
            bone_count: r.u32("bone_count")?,
            weight_width: r.i32("weight_width")?,
            locator_count: r.u32("locator_count")?,
            skeleton_hash: r.u64("skeleton_hash")?,
            bbox_center: r.floats("bbox_center")?,
            bbox_diagonal: r.f32("bbox_diagonal")?,
            bbox_min: r.floats("bbox_min")?,
            bbox_max: r.floats("bbox_max")?,
        })
    }
}

/// A model's footprint on the map.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelBounds {
    pub center: [f32; 3],
    /// Extent along x.
    pub width: f32,
    /// Extent along z.
    pub length: f32,
    /// Extent along y.
    pub height: f32,
}

impl ModelBounds {
    /// Decode a `.pmg` header and reduce its bounding box.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = ModelHeader::decode(data).map_err(|err| match &err.kind {
            DecodeErrorKind::UnknownVariant { tag } => Error::UnsupportedVersion {
                format: "model",
                version: *tag as u32,
            },
            _ => Error::Decode(err),
        })?;
        Ok(Self::from_header(&header))
    }

    pub fn from_header(header: &ModelHeader) -> Self {
        let [min_x, min_y, min_z] = header.bbox_min;
        let [max_x, max_y, max_z] = header.bbox_max;
        Self {
            center: header.bbox_center,
            width: max_x - min_x,
            length: max_z - min_z,
            height: max_y - min_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pmg_header(version: u8) -> Vec<u8> {
        let mut out = vec![version];
        out.extend_from_slice(MAGIC);
        for v in [3u32, 1, 0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&(-1i32).to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&0xDEAD_BEEFu64.to_le_bytes());
        for v in [0.5f32, 1.0, -2.0, 7.0, -4.0, 0.0, -8.0, 5.0, 2.0, 4.0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_bounds() {
        let bounds = ModelBounds::parse(&pmg_header(0x16)).unwrap();
        assert_eq!(bounds.center, [0.5, 1.0, -2.0]);
        assert_eq!(bounds.width, 9.0);
        assert_eq!(bounds.height, 2.0);
        assert_eq!(bounds.length, 12.0);
    }

    #[test]
    fn test_header_fields() {
        let header = ModelHeader::decode(&pmg_header(0x15)).unwrap();
        assert_eq!(header.version, 0x15);
        assert_eq!(header.piece_count, 3);
        assert_eq!(header.weight_width, -1);
        assert_eq!(header.skeleton_hash, 0xDEAD_BEEF);
    }

    #[test]
    fn test_unsupported_version() {
        let err = ModelBounds::parse(&pmg_header(0x14)).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedVersion {
                format: "model",
                version: 0x14
            }
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = pmg_header(0x16);
        data[1] = b'X';
        let err = ModelBounds::parse(&data).unwrap_err();
        match err {
            Error::Decode(e) => assert!(matches!(e.kind, DecodeErrorKind::InvalidMagic { .. })),
            other => panic!("unexpected {other:?}"),
        }
    }
}
