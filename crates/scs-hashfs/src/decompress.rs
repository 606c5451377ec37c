//! Decompression utilities for HashFS payloads.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{Compression, Error, ReaderOptions, Result, TileStreamDecoder};

/// Size of the wrapper in front of a GDEFLATE tile stream.
pub const TILE_STREAM_HEADER_SIZE: usize = 16;

/// Decompress zlib-wrapped data.
pub fn decompress_zlib(data: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut decoder = ZlibDecoder::new(data);

    output.clear();
    decoder
        .read_to_end(output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    Ok(())
}

/// Decompress zlib-wrapped data with known output size.
pub fn decompress_zlib_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);
    decompress_zlib(data, &mut output)?;
    Ok(output)
}

/// Decode one payload according to its codec.
pub fn decompress(
    compression: Compression,
    data: &[u8],
    size: usize,
    options: &ReaderOptions,
) -> Result<Vec<u8>> {
    let output = match compression {
        Compression::None => data.to_vec(),
        Compression::Zlib => decompress_zlib_sized(data, size)?,
        Compression::GDeflate => {
            let decoder = options
                .tile_decoder
                .as_ref()
                .ok_or(Error::UnsupportedCompression(compression))?;
            let stream = data.get(TILE_STREAM_HEADER_SIZE..).ok_or_else(|| {
                Error::Decompression(format!(
                    "tile stream of {} bytes is shorter than its header",
                    data.len()
                ))
            })?;
            decoder
                .decompress(stream, size)
                .map_err(|e| Error::Decompression(e.to_string()))?
        }
        Compression::Deflate | Compression::Zstd | Compression::Unknown(_) => {
            return Err(Error::UnsupportedCompression(compression));
        }
    };

    if options.verify_sizes && output.len() != size {
        return Err(Error::Decompression(format!(
            "{compression} payload size mismatch: expected {size}, got {}",
            output.len()
        )));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_zlib_payload() {
        let original = b"SiiNunit { city_data : city.test { } }";
        let compressed = zlib(original);
        let out = decompress(
            Compression::Zlib,
            &compressed,
            original.len(),
            &ReaderOptions::default(),
        )
        .unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn test_declared_size_is_checked() {
        let err = decompress(Compression::None, b"abc", 4, &ReaderOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));

        let lenient = ReaderOptions::default().verify_sizes(false);
        assert_eq!(decompress(Compression::None, b"abc", 4, &lenient).unwrap(), b"abc");
    }

    #[test]
    fn test_unsupported_codecs() {
        let options = ReaderOptions::default().without_tile_decoder();
        for codec in [
            Compression::Deflate,
            Compression::Zstd,
            Compression::GDeflate,
            Compression::Unknown(9),
        ] {
            let err = decompress(codec, &[0; 32], 16, &options).unwrap_err();
            assert!(matches!(err, Error::UnsupportedCompression(c) if c == codec));
        }
    }

    #[test]
    fn test_tile_stream_header_is_skipped() {
        struct Passthrough;
        impl TileStreamDecoder for Passthrough {
            fn decompress(&self, tile_stream: &[u8], _: usize) -> std::io::Result<Vec<u8>> {
                Ok(tile_stream.to_vec())
            }
        }

        let options = ReaderOptions::default().with_tile_decoder(Passthrough);
        let mut data = vec![0xEE; TILE_STREAM_HEADER_SIZE];
        data.extend_from_slice(b"tile");
        assert_eq!(
            decompress(Compression::GDeflate, &data, 4, &options).unwrap(),
            b"tile"
        );
    }

    #[cfg(feature = "gdeflate")]
    #[test]
    fn test_gdeflate_by_default() {
        let original: Vec<u8> = b"SiiNunit { }\n".repeat(9000);
        let wrapped = crate::gdeflate::encode(&[0xAB; TILE_STREAM_HEADER_SIZE], &original);
        let out = decompress(
            Compression::GDeflate,
            &wrapped,
            original.len(),
            &ReaderOptions::default(),
        )
        .unwrap();
        assert_eq!(out, original);
    }
}
