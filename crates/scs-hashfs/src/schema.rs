//! On-disk record layouts of a HashFS v2 package.
//!
//! ```text
//! header (53 bytes) | payloads ... | entry table | metadata table
//! ```
//!
//! Entry records point at metadata headers by word index; each header points
//! at its record body in the same metadata table.

use std::sync::LazyLock;

use scs_struct::dsl::*;
use scs_struct::{DecodeError, Layout, Length, Prim, Result, Schema, Value};

use crate::Compression;

fn root(value: &Value) -> Result<&scs_struct::Record> {
    value
        .as_record()
        .ok_or_else(|| DecodeError::type_mismatch(0, "record", "a struct"))
}

/// Package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub salt: u16,
    pub hash_method: [u8; 4],
    pub entry_table_count: u32,
    pub entry_table_compressed_size: u32,
    pub metadata_table_size: u32,
    pub metadata_table_compressed_size: u32,
    pub entry_table_offset: u64,
    pub metadata_table_offset: u64,
    pub security_descriptor_offset: u64,
    pub platform: u8,
}

impl PackageHeader {
    pub const MAGIC: [u8; 4] = *b"SCS#";
    pub const HASH_METHOD: [u8; 4] = *b"CITY";
    pub const VERSION: u16 = 2;
    pub const SIZE: usize = 53;

    /// Whether the magic, hash method and version identify a readable package.
    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC
            && self.hash_method == Self::HASH_METHOD
            && self.version == Self::VERSION
    }

    /// Uncompressed size of the entry table.
    pub fn entry_table_size(&self) -> usize {
        self.entry_table_count as usize * EntryRecord::SIZE
    }
}

fn four_bytes(record: &scs_struct::Record, name: &'static str) -> Result<[u8; 4]> {
    record
        .bytes(name)?
        .try_into()
        .map_err(|_| DecodeError::type_mismatch(record.offset(), name, "four bytes"))
}

impl Schema for PackageHeader {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("magic", bytes(Length::Fixed(4))),
                field("version", u16()),
                field("salt", u16()),
                field("hash_method", bytes(Length::Fixed(4))),
                field("entry_table_count", u32()),
                field("entry_table_compressed_size", u32()),
                field("metadata_table_size", u32()),
                field("metadata_table_compressed_size", u32()),
                field("entry_table_offset", u64()),
                field("metadata_table_offset", u64()),
                field("security_descriptor_offset", u64()),
                field("platform", u8()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        let r = root(value)?;
        Ok(Self {
            magic: four_bytes(r, "magic")?,
            version: r.u16("version")?,
            salt: r.u16("salt")?,
            hash_method: four_bytes(r, "hash_method")?,
            entry_table_count: r.u32("entry_table_count")?,
            entry_table_compressed_size: r.u32("entry_table_compressed_size")?,
            metadata_table_size: r.u32("metadata_table_size")?,
            metadata_table_compressed_size: r.u32("metadata_table_compressed_size")?,
            entry_table_offset: r.u64("entry_table_offset")?,
            metadata_table_offset: r.u64("metadata_table_offset")?,
            security_descriptor_offset: r.u64("security_descriptor_offset")?,
            platform: r.u8("platform")?,
        })
    }
}

/// One row of the entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRecord {
    pub hash: u64,
    pub metadata_index: u32,
    pub metadata_count: u16,
    pub is_directory: bool,
}

impl EntryRecord {
    pub const SIZE: usize = 16;
}

impl Schema for EntryRecord {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("hash", u64()),
                field("metadata_index", u32()),
                field("metadata_count", u16()),
                field("flags", bitfield(Prim::U8, &["is_directory"])),
                field("_reserved", reserved(u8(), 1)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        let r = root(value)?;
        Ok(Self {
            hash: r.u64("hash")?,
            metadata_index: r.u32("metadata_index")?,
            metadata_count: r.u16("metadata_count")?,
            is_directory: r.flags("flags")?.get("is_directory"),
        })
    }
}

/// Metadata type tags.
pub mod tag {
    pub const IMAGE: u8 = 1;
    pub const SAMPLE: u8 = 2;
    pub const MIP_PROXY: u8 = 3;
    pub const INLINE_DIRECTORY: u8 = 4;
    pub const PMA_INFO: u8 = 5;
    pub const PMG_INFO: u8 = 6;
    /// Set on every tag whose body is a [`super::PlainData`].
    pub const PLAIN_FLAG: u8 = 0x80;
    pub const PLAIN: u8 = PLAIN_FLAG | 1;
    pub const DIRECTORY: u8 = PLAIN_FLAG | 2;
    pub const MIP_0: u8 = PLAIN_FLAG | 3;
    pub const MIP_1: u8 = PLAIN_FLAG | 4;
    pub const MIP_TAIL: u8 = PLAIN_FLAG | 5;
}

/// A metadata header word: body location plus type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataHeader {
    /// Word index of the body within the metadata table.
    pub index: u32,
    pub tag: u8,
}

impl MetadataHeader {
    pub fn from_word(word: u32) -> Self {
        Self {
            index: word & 0x00FF_FFFF,
            tag: (word >> 24) as u8,
        }
    }

    pub fn to_word(self) -> u32 {
        (self.index & 0x00FF_FFFF) | ((self.tag as u32) << 24)
    }

    /// Byte offset of the body within the metadata table.
    pub fn body_offset(self) -> usize {
        self.index as usize * 4
    }
}

/// Texture surface description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub mipmap_count: u32,
    /// DXGI format.
    pub format: u32,
    /// Non-zero for cube maps.
    pub cube: u8,
    /// Surfaces (array layers or cube faces sets).
    pub count: u32,
    /// Row alignment in bytes.
    pub pitch_alignment: u32,
    /// Surface alignment in bytes.
    pub image_alignment: u32,
}

impl ImageMeta {
    pub const SIZE: usize = 8;

    pub fn is_cube(&self) -> bool {
        self.cube != 0
    }

    /// Pack back into the stored flag word.
    pub fn flags(&self) -> u32 {
        (self.mipmap_count.saturating_sub(1) & 0xF)
            | ((self.format & 0xFF) << 4)
            | (((self.cube as u32) & 0x3) << 12)
            | ((self.count.saturating_sub(1) & 0x3F) << 14)
            | ((self.pitch_alignment.max(1).trailing_zeros() & 0xF) << 20)
            | ((self.image_alignment.max(1).trailing_zeros() & 0xF) << 24)
    }
}

impl Schema for ImageMeta {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("width", u16()),
                field("height", u16()),
                field("flags", u32()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        let r = root(value)?;
        let flags = r.u32("flags")?;
        Ok(Self {
            width: r.u32("width")? + 1,
            height: r.u32("height")? + 1,
            mipmap_count: (flags & 0xF) + 1,
            format: (flags >> 4) & 0xFF,
            cube: ((flags >> 12) & 0x3) as u8,
            count: ((flags >> 14) & 0x3F) + 1,
            pitch_alignment: 1 << ((flags >> 20) & 0xF),
            image_alignment: 1 << ((flags >> 24) & 0xF),
        })
    }
}

/// Texture sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleMeta {
    pub mag_filter: u8,
    pub min_filter: u8,
    pub mip_filter: u8,
    pub address_u: u8,
    pub address_v: u8,
    pub address_w: u8,
}

impl SampleMeta {
    pub const SIZE: usize = 4;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            mag_filter: (bits & 0x1) as u8,
            min_filter: ((bits >> 1) & 0x1) as u8,
            mip_filter: ((bits >> 2) & 0x3) as u8,
            address_u: ((bits >> 4) & 0x7) as u8,
            address_v: ((bits >> 7) & 0x7) as u8,
            address_w: ((bits >> 10) & 0x7) as u8,
        }
    }
}

impl Schema for SampleMeta {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| strukt(vec![field("bits", u32())]));
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::from_bits(root(value)?.u32("bits")?))
    }
}

/// Location and codec of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainData {
    pub compressed_size: u32,
    pub compression: Compression,
    pub size: u32,
    /// Absolute byte offset in the package.
    pub offset: u64,
}

impl PlainData {
    pub const SIZE: usize = 16;
    const SIZE_MASK: u32 = 0x0FFF_FFFF;
}

impl Schema for PlainData {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("packed_size", u32()),
                field("size", u32()),
                field("_reserved", reserved(u32(), 1)),
                field("offset_block", u32()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        let r = root(value)?;
        let packed = r.u32("packed_size")?;
        Ok(Self {
            compressed_size: packed & Self::SIZE_MASK,
            compression: Compression::from_bits((packed >> 28) as u8),
            size: r.u32("size")? & Self::SIZE_MASK,
            offset: r.u64("offset_block")? * 16,
        })
    }
}

/// Animation metadata attached to `.pma` files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmaInfo {
    pub flags: u32,
    pub anim_length: f32,
    pub skeleton_hash: u64,
}

impl PmaInfo {
    pub const SIZE: usize = 32;
}

impl Schema for PmaInfo {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("flags", u32()),
                field("anim_length", f32()),
                field("_reserved", reserved(u32(), 2)),
                field("skeleton_hash", u64()),
                field("_reserved_tail", reserved(u64(), 1)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        let r = root(value)?;
        Ok(Self {
            flags: r.u32("flags")?,
            anim_length: r.f32("anim_length")?,
            skeleton_hash: r.u64("skeleton_hash")?,
        })
    }
}

/// Model metadata attached to `.pmg` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmgInfo {
    pub skeleton_hash: u64,
}

impl PmgInfo {
    pub const SIZE: usize = 8;
}

impl Schema for PmgInfo {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> =
            LazyLock::new(|| strukt(vec![field("skeleton_hash", u64())]));
        &LAYOUT
    }

    fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            skeleton_hash: root(value)?.u64("skeleton_hash")?,
        })
    }
}

/// A decoded metadata record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetadataRecord {
    Image(ImageMeta),
    Sample(SampleMeta),
    MipProxy,
    InlineDirectory,
    PmaInfo(PmaInfo),
    PmgInfo(PmgInfo),
    Plain(PlainData),
    Directory(PlainData),
    Mip0(PlainData),
    Mip1(PlainData),
    MipTail(PlainData),
}

impl MetadataRecord {
    pub fn name(&self) -> &'static str {
        match self {
            MetadataRecord::Image(_) => "image",
            MetadataRecord::Sample(_) => "sample",
            MetadataRecord::MipProxy => "mip proxy",
            MetadataRecord::InlineDirectory => "inline directory",
            MetadataRecord::PmaInfo(_) => "pma info",
            MetadataRecord::PmgInfo(_) => "pmg info",
            MetadataRecord::Plain(_) => "plain",
            MetadataRecord::Directory(_) => "directory",
            MetadataRecord::Mip0(_) => "mip 0",
            MetadataRecord::Mip1(_) => "mip 1",
            MetadataRecord::MipTail(_) => "mip tail",
        }
    }
}
