//! Decoding the top surface of a DDS file to RGBA8.

use scs_common::BinaryReader;

use crate::bc::{decode_blocks, BlockFormat};
use crate::header::{dxgi, pixel_flags, DdsHeader, DdsHeaderDxt10, FourCC};
use crate::{Error, Result, DDS_MAGIC};

/// A parsed DDS file borrowing its surface data.
#[derive(Debug, Clone)]
pub struct DdsFile<'a> {
    pub header: DdsHeader,
    pub dx10: Option<DdsHeaderDxt10>,
    /// Everything after the headers.
    pub data: &'a [u8],
}

impl<'a> DdsFile<'a> {
    /// Validate magic and header size and split off the surface data.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let magic: [u8; 4] = reader.read_array()?;
        if &magic != DDS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let header: DdsHeader = reader.read_struct()?;
        let size = header.size;
        if size != DdsHeader::SIZE {
            return Err(Error::InvalidHeader(format!(
                "header size field is {size}, expected {}",
                DdsHeader::SIZE
            )));
        }

        let dx10 = if header.is_dx10() {
            Some(reader.read_struct::<DdsHeaderDxt10>()?)
        } else {
            None
        };

        Ok(Self {
            header,
            dx10,
            data: reader.remaining_bytes(),
        })
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Work out which decode path applies.
    pub fn source_format(&self) -> Result<SourceFormat> {
        if let Some(dx10) = self.dx10 {
            let format = dx10.dxgi_format;
            return match format {
                dxgi::R8G8B8A8_UNORM | dxgi::R8G8B8A8_UNORM_SRGB => Ok(SourceFormat::Rgba8),
                dxgi::B8G8R8A8_UNORM | dxgi::B8G8R8A8_UNORM_SRGB => Ok(SourceFormat::Bgra8),
                dxgi::B8G8R8X8_UNORM => Ok(SourceFormat::Bgrx8),
                dxgi::BC1_UNORM | dxgi::BC1_UNORM_SRGB => Ok(SourceFormat::Block(BlockFormat::Bc1)),
                dxgi::BC2_UNORM | dxgi::BC2_UNORM_SRGB => Ok(SourceFormat::Block(BlockFormat::Bc2)),
                dxgi::BC3_UNORM | dxgi::BC3_UNORM_SRGB => Ok(SourceFormat::Block(BlockFormat::Bc3)),
                other => Err(Error::UnsupportedFormat(format!("DXGI format {other}"))),
            };
        }

        let pf = self.header.pixel_format;
        let pf_flags = pf.flags;
        if pf_flags & pixel_flags::FOURCC != 0 {
            let four_cc = pf.four_cc;
            return match four_cc {
                FourCC::DXT1 => Ok(SourceFormat::Block(BlockFormat::Bc1)),
                FourCC::DXT3 => Ok(SourceFormat::Block(BlockFormat::Bc2)),
                FourCC::DXT5 => Ok(SourceFormat::Block(BlockFormat::Bc3)),
                FourCC(code) => Err(Error::UnsupportedFormat(format!(
                    "FourCC {:?}",
                    String::from_utf8_lossy(&code)
                ))),
            };
        }

        let (bits, r_mask, a_mask) = (pf.rgb_bit_count, pf.r_bit_mask, pf.a_bit_mask);
        if pf_flags & pixel_flags::RGB != 0 && bits == 32 {
            let has_alpha = pf_flags & pixel_flags::ALPHA_PIXELS != 0 && a_mask != 0;
            return match (r_mask, has_alpha) {
                (0x0000_00FF, _) => Ok(SourceFormat::Rgba8),
                (0x00FF_0000, true) => Ok(SourceFormat::Bgra8),
                (0x00FF_0000, false) => Ok(SourceFormat::Bgrx8),
                _ => Err(Error::UnsupportedFormat(format!(
                    "32-bit RGB with red mask {r_mask:#010x}"
                ))),
            };
        }

        Err(Error::UnsupportedFormat(format!(
            "pixel format flags {pf_flags:#x}, {bits} bits"
        )))
    }
}

/// How the top surface was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Rgba8,
    Bgra8,
    /// BGRA with an unused alpha byte.
    Bgrx8,
    Block(BlockFormat),
}

/// A decoded surface.
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub source: SourceFormat,
    /// Tightly packed RGBA8 rows.
    pub rgba: Vec<u8>,
}

impl Texture {
    /// Decode the largest mip of a DDS file.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let dds = DdsFile::parse(bytes)?;
        let source = dds.source_format()?;
        let (width, height) = (dds.width(), dds.height());
        let texels = width as usize * height as usize;

        let rgba = match source {
            SourceFormat::Block(format) => {
                let expected = width.div_ceil(4) as usize
                    * height.div_ceil(4) as usize
                    * format.block_bytes();
                check_len(dds.data, expected)?;
                decode_blocks(format, width, height, dds.data)
            }
            SourceFormat::Rgba8 => {
                check_len(dds.data, texels * 4)?;
                dds.data[..texels * 4].to_vec()
            }
            SourceFormat::Bgra8 | SourceFormat::Bgrx8 => {
                check_len(dds.data, texels * 4)?;
                let opaque = source == SourceFormat::Bgrx8;
                let mut rgba = Vec::with_capacity(texels * 4);
                for px in dds.data[..texels * 4].chunks_exact(4) {
                    rgba.extend_from_slice(&[px[2], px[1], px[0], if opaque { 255 } else { px[3] }]);
                }
                rgba
            }
        };

        tracing::trace!(width, height, ?source, "decoded texture");
        Ok(Self {
            width,
            height,
            source,
            rgba,
        })
    }
}

fn check_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(Error::SurfaceTooShort {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use zerocopy::IntoBytes;

    use super::*;
    use crate::header::DdsPixelFormat;

    fn legacy_bgra(width: u32, height: u32) -> DdsHeader {
        let mut header = DdsHeader::dx10(width, height, 1, dxgi::B8G8R8A8_UNORM, false);
        header.pixel_format = DdsPixelFormat {
            size: DdsPixelFormat::SIZE,
            flags: pixel_flags::RGB | pixel_flags::ALPHA_PIXELS,
            four_cc: FourCC([0; 4]),
            rgb_bit_count: 32,
            r_bit_mask: 0x00FF_0000,
            g_bit_mask: 0x0000_FF00,
            b_bit_mask: 0x0000_00FF,
            a_bit_mask: 0xFF00_0000,
        };
        header
    }

    #[test]
    fn test_raw_bgra_is_swapped() {
        let mut file = DDS_MAGIC.to_vec();
        file.extend_from_slice(legacy_bgra(2, 1).as_bytes());
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let texture = Texture::decode(&file).unwrap();
        assert_eq!(texture.source, SourceFormat::Bgra8);
        assert_eq!(texture.rgba, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_dx10_bc1() {
        let mut file = DDS_MAGIC.to_vec();
        file.extend_from_slice(DdsHeader::dx10(4, 4, 1, dxgi::BC1_UNORM, false).as_bytes());
        file.extend_from_slice(DdsHeaderDxt10::texture_2d(dxgi::BC1_UNORM, 1, false).as_bytes());
        file.extend_from_slice(&[0x1F, 0x00, 0x1F, 0x00, 0, 0, 0, 0]);

        let texture = Texture::decode(&file).unwrap();
        assert_eq!(texture.source, SourceFormat::Block(BlockFormat::Bc1));
        assert_eq!(&texture.rgba[..4], [0, 0, 255, 255]);
    }

    #[test]
    fn test_header_size_is_checked() {
        let mut header = legacy_bgra(1, 1);
        header.size = 100;
        let mut file = DDS_MAGIC.to_vec();
        file.extend_from_slice(header.as_bytes());
        file.extend_from_slice(&[0; 4]);

        assert!(matches!(
            Texture::decode(&file),
            Err(Error::InvalidHeader(_))
        ));
        assert!(matches!(
            Texture::decode(b"PNG whatever"),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_short_surface() {
        let mut file = DDS_MAGIC.to_vec();
        file.extend_from_slice(legacy_bgra(4, 4).as_bytes());
        file.extend_from_slice(&[0; 8]);
        assert!(matches!(
            Texture::decode(&file),
            Err(Error::SurfaceTooShort { expected: 64, actual: 8 })
        ));
    }
}
