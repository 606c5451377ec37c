//! DDS header structures.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Header flag bits (`DDSD_*`).
pub mod flags {
    pub const CAPS: u32 = 0x1;
    pub const HEIGHT: u32 = 0x2;
    pub const WIDTH: u32 = 0x4;
    pub const PITCH: u32 = 0x8;
    pub const PIXEL_FORMAT: u32 = 0x1000;
    pub const MIPMAP_COUNT: u32 = 0x20000;
    pub const LINEAR_SIZE: u32 = 0x80000;
}

/// Pixel format flag bits (`DDPF_*`).
pub mod pixel_flags {
    pub const ALPHA_PIXELS: u32 = 0x1;
    pub const FOURCC: u32 = 0x4;
    pub const RGB: u32 = 0x40;
}

/// Capability bits (`DDSCAPS_*`, `DDSCAPS2_*`).
pub mod caps {
    pub const COMPLEX: u32 = 0x8;
    pub const TEXTURE: u32 = 0x1000;
    pub const MIPMAP: u32 = 0x40_0000;
    /// Cube map with all six faces present.
    pub const CUBEMAP_ALL_FACES: u32 = 0xFE00;
}

/// The DXGI formats this crate knows by name.
pub mod dxgi {
    pub const R8G8B8A8_UNORM: u32 = 28;
    pub const R8G8B8A8_UNORM_SRGB: u32 = 29;
    pub const BC1_UNORM: u32 = 71;
    pub const BC1_UNORM_SRGB: u32 = 72;
    pub const BC2_UNORM: u32 = 74;
    pub const BC2_UNORM_SRGB: u32 = 75;
    pub const BC3_UNORM: u32 = 77;
    pub const BC3_UNORM_SRGB: u32 = 78;
    pub const BC4_UNORM: u32 = 80;
    pub const BC4_SNORM: u32 = 81;
    pub const BC5_UNORM: u32 = 83;
    pub const BC5_SNORM: u32 = 84;
    pub const B8G8R8A8_UNORM: u32 = 87;
    pub const B8G8R8X8_UNORM: u32 = 88;
    pub const B8G8R8A8_UNORM_SRGB: u32 = 91;
    pub const BC6H_UF16: u32 = 95;
    pub const BC6H_SF16: u32 = 96;
    pub const BC7_UNORM: u32 = 98;
    pub const BC7_UNORM_SRGB: u32 = 99;

    /// Bytes per 4x4 block for block-compressed formats.
    pub fn block_bytes(format: u32) -> Option<usize> {
        match format {
            70..=72 | 79..=81 => Some(8),
            73..=78 | 82..=84 | 94..=99 => Some(16),
            _ => None,
        }
    }

    /// Bytes per pixel for the uncompressed formats that appear in game data.
    pub fn pixel_bytes(format: u32) -> Option<usize> {
        match format {
            2 => Some(16),
            10 | 11 | 16 => Some(8),
            24 | 26 | 27..=29 | 41 | 87..=91 => Some(4),
            48..=50 | 53 | 54 | 56 => Some(2),
            60..=63 | 65 => Some(1),
            _ => None,
        }
    }

    /// Formats whose stored rows may carry pitch padding in packages.
    pub fn is_padded_rgba(format: u32) -> bool {
        matches!(format, R8G8B8A8_UNORM | B8G8R8A8_UNORM)
    }
}

/// The 124-byte header following the `DDS ` magic.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsHeader {
    /// Always [`DdsHeader::SIZE`]; anything else is rejected.
    pub size: u32,
    /// See [`flags`].
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    /// Row pitch for raw pixels, top-level byte size for block formats.
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    /// See [`caps`].
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl DdsHeader {
    pub const SIZE: u32 = 124;

    /// Header for a 2D texture whose format lives in a DX10 extension header.
    pub fn dx10(width: u32, height: u32, mipmap_count: u32, format: u32, cube: bool) -> Self {
        let mut header_flags =
            flags::CAPS | flags::HEIGHT | flags::WIDTH | flags::PIXEL_FORMAT | flags::MIPMAP_COUNT;
        let pitch_or_linear_size = match (dxgi::block_bytes(format), dxgi::pixel_bytes(format)) {
            (Some(block), _) => {
                header_flags |= flags::LINEAR_SIZE;
                (width.div_ceil(4).max(1) * height.div_ceil(4).max(1)) * block as u32
            }
            (None, Some(pixel)) => {
                header_flags |= flags::PITCH;
                width * pixel as u32
            }
            (None, None) => 0,
        };

        let mut surface_caps = caps::TEXTURE;
        if mipmap_count > 1 {
            surface_caps |= caps::COMPLEX | caps::MIPMAP;
        }
        if cube {
            surface_caps |= caps::COMPLEX;
        }

        Self {
            size: Self::SIZE,
            flags: header_flags,
            height,
            width,
            pitch_or_linear_size,
            depth: 0,
            mipmap_count,
            reserved1: [0; 11],
            pixel_format: DdsPixelFormat {
                size: DdsPixelFormat::SIZE,
                flags: pixel_flags::FOURCC,
                four_cc: FourCC::DX10,
                rgb_bit_count: 0,
                r_bit_mask: 0,
                g_bit_mask: 0,
                b_bit_mask: 0,
                a_bit_mask: 0,
            },
            caps: surface_caps,
            caps2: if cube { caps::CUBEMAP_ALL_FACES } else { 0 },
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }

    /// Whether a [`DdsHeaderDxt10`] follows.
    pub fn is_dx10(&self) -> bool {
        self.pixel_format.flags & pixel_flags::FOURCC != 0 && self.pixel_format.four_cc == FourCC::DX10
    }
}

/// Pixel format block embedded in [`DdsHeader`].
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsPixelFormat {
    pub size: u32,
    /// See [`pixel_flags`].
    pub flags: u32,
    /// Only meaningful with [`pixel_flags::FOURCC`].
    pub four_cc: FourCC,
    pub rgb_bit_count: u32,
    /// Channel masks; they tell BGRA from RGBA for 32-bit surfaces.
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

impl DdsPixelFormat {
    pub const SIZE: u32 = 32;
}

/// Compression tag in the pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// BC1.
    pub const DXT1: Self = Self(*b"DXT1");
    /// BC2.
    pub const DXT3: Self = Self(*b"DXT3");
    /// BC3.
    pub const DXT5: Self = Self(*b"DXT5");
    /// The format is in the extension header.
    pub const DX10: Self = Self(*b"DX10");
}

/// Extension header present when the FourCC is `DX10`.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsHeaderDxt10 {
    /// One of the [`dxgi`] constants.
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

impl DdsHeaderDxt10 {
    /// `D3D10_RESOURCE_DIMENSION_TEXTURE2D`.
    pub const TEXTURE_2D: u32 = 3;
    /// `DDS_RESOURCE_MISC_TEXTURECUBE`.
    pub const MISC_TEXTURE_CUBE: u32 = 0x4;

    pub fn texture_2d(dxgi_format: u32, array_size: u32, cube: bool) -> Self {
        Self {
            dxgi_format,
            resource_dimension: Self::TEXTURE_2D,
            misc_flag: if cube { Self::MISC_TEXTURE_CUBE } else { 0 },
            array_size,
            misc_flags2: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(std::mem::size_of::<DdsHeader>(), DdsHeader::SIZE as usize);
        assert_eq!(std::mem::size_of::<DdsPixelFormat>(), DdsPixelFormat::SIZE as usize);
        assert_eq!(std::mem::size_of::<DdsHeaderDxt10>(), 20);
    }

    #[test]
    fn test_dx10_header_for_block_format() {
        let header = DdsHeader::dx10(256, 128, 9, dxgi::BC3_UNORM, false);
        assert!(header.is_dx10());
        let linear = header.pitch_or_linear_size;
        assert_eq!(linear, 64 * 32 * 16);
        let header_caps = header.caps;
        assert_eq!(header_caps & caps::MIPMAP, caps::MIPMAP);
    }

    #[test]
    fn test_dxgi_sizes() {
        assert_eq!(dxgi::block_bytes(dxgi::BC1_UNORM), Some(8));
        assert_eq!(dxgi::block_bytes(dxgi::BC7_UNORM_SRGB), Some(16));
        assert_eq!(dxgi::block_bytes(dxgi::B8G8R8A8_UNORM), None);
        assert_eq!(dxgi::pixel_bytes(dxgi::B8G8R8A8_UNORM), Some(4));
    }
}
