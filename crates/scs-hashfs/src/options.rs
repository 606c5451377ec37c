//! Reader configuration and payload codecs.

use std::fmt;
use std::rc::Rc;

/// Payload codec, stored in the top four bits of a plain-data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Stored as-is.
    None,
    /// zlib-wrapped deflate.
    Zlib,
    /// Raw deflate without a zlib header.
    Deflate,
    /// GPU tile-stream deflate.
    GDeflate,
    Zstd,
    Unknown(u8),
}

impl Compression {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Compression::None,
            1 => Compression::Zlib,
            2 => Compression::Deflate,
            3 => Compression::GDeflate,
            4 => Compression::Zstd,
            other => Compression::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zlib => 1,
            Compression::Deflate => 2,
            Compression::GDeflate => 3,
            Compression::Zstd => 4,
            Compression::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => f.write_str("store"),
            Compression::Zlib => f.write_str("zlib"),
            Compression::Deflate => f.write_str("headerless deflate"),
            Compression::GDeflate => f.write_str("gdeflate"),
            Compression::Zstd => f.write_str("zstd"),
            Compression::Unknown(bits) => write!(f, "codec {bits}"),
        }
    }
}

/// Decoder for GDEFLATE tile streams.
///
/// Receives the stream with its 16-byte wrapper header already removed and
/// must return exactly `output_size` bytes.
pub trait TileStreamDecoder {
    fn decompress(&self, tile_stream: &[u8], output_size: usize) -> std::io::Result<Vec<u8>>;
}

/// Options applied to every read from a package.
#[derive(Clone)]
pub struct ReaderOptions {
    /// GDEFLATE payloads fail with `UnsupportedCompression` when unset.
    /// Defaults to `GDeflateDecoder` with the `gdeflate` feature.
    pub tile_decoder: Option<Rc<dyn TileStreamDecoder>>,
    /// Reject payloads whose decompressed length differs from the declared size.
    pub verify_sizes: bool,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile_decoder(mut self, decoder: impl TileStreamDecoder + 'static) -> Self {
        self.tile_decoder = Some(Rc::new(decoder));
        self
    }

    /// Drop the tile decoder, making GDEFLATE payloads unsupported.
    pub fn without_tile_decoder(mut self) -> Self {
        self.tile_decoder = None;
        self
    }

    pub fn verify_sizes(mut self, verify: bool) -> Self {
        self.verify_sizes = verify;
        self
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            tile_decoder: default_tile_decoder(),
            verify_sizes: true,
        }
    }
}

#[cfg(feature = "gdeflate")]
fn default_tile_decoder() -> Option<Rc<dyn TileStreamDecoder>> {
    Some(Rc::new(crate::GDeflateDecoder))
}

#[cfg(not(feature = "gdeflate"))]
fn default_tile_decoder() -> Option<Rc<dyn TileStreamDecoder>> {
    None
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("tile_decoder", &self.tile_decoder.is_some())
            .field("verify_sizes", &self.verify_sizes)
            .finish()
    }
}
