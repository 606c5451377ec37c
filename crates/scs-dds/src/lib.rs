//! DDS texture handling for SCS game files.
//!
//! Texture objects inside HashFS packages are stored without a DDS header;
//! [`DdsHeader::dx10`] and [`DdsHeaderDxt10::texture_2d`] build the headers
//! needed to turn them back into standalone `.dds` files. [`Texture::decode`]
//! turns the largest mip of a DDS file into RGBA8, either by swapping channels
//! of raw 32-bit pixels or by decompressing BC1/BC2/BC3 blocks.
//!
//! # Example
//!
//! ```no_run
//! use scs_dds::Texture;
//!
//! let bytes = std::fs::read("sign.dds")?;
//! let texture = Texture::decode(&bytes)?;
//! println!("{}x{} from {:?}", texture.width, texture.height, texture.source);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bc;
mod error;
mod header;
mod texture;

pub use bc::{decode_blocks, BlockFormat};
pub use error::{Error, Result};
pub use header::{caps, dxgi, flags, pixel_flags, DdsHeader, DdsHeaderDxt10, DdsPixelFormat, FourCC};
pub use texture::{DdsFile, SourceFormat, Texture};

/// DDS file magic bytes ("DDS ").
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
