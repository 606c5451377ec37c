//! GDEFLATE tile streams, decoded with libdeflate's GDeflate codec.
//!
//! After the package's own wrapper header, a payload is a tile stream:
//!
//! ```text
//! u8   id            always 4
//! u8   magic         id ^ 0xFF
//! u16  tile_count
//! u32  bit 0-1 tile size index (1 = 64 KiB), bit 2-19 last tile size
//! u32  offsets[tile_count]   offsets[0] holds the last tile's compressed size
//! ...  tile data
//! ```

use std::io;

use gdeflate::sys;
use scs_common::BinaryReader;

use crate::TileStreamDecoder;

const STREAM_ID: u8 = 4;
const TILE_SIZE: usize = 64 * 1024;

/// [`TileStreamDecoder`] backed by libdeflate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GDeflateDecoder;

struct TileHeader {
    tile_count: usize,
    last_tile_size: usize,
}

impl TileHeader {
    fn uncompressed_size(&self) -> usize {
        match self.last_tile_size {
            0 => self.tile_count * TILE_SIZE,
            last => (self.tile_count - 1) * TILE_SIZE + last,
        }
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn read_header(reader: &mut BinaryReader<'_>) -> io::Result<TileHeader> {
    let truncated = |e: scs_common::Error| invalid(e.to_string());
    let [id, magic, count_lo, count_hi] = reader.read_array::<4>().map_err(truncated)?;
    let tile_count = u16::from_le_bytes([count_lo, count_hi]);
    let bits = reader.read_u32().map_err(truncated)?;
    if id != STREAM_ID || magic != id ^ 0xFF {
        return Err(invalid(format!(
            "not a GDEFLATE tile stream (id {id}, magic {magic:#04x})"
        )));
    }
    if bits & 0b11 != 1 {
        return Err(invalid(format!("unsupported tile size index {}", bits & 0b11)));
    }
    if tile_count == 0 {
        return Err(invalid("tile stream has no tiles".into()));
    }
    Ok(TileHeader {
        tile_count: tile_count as usize,
        last_tile_size: ((bits >> 2) & 0x3FFFF) as usize,
    })
}

/// Owns a libdeflate decompressor for the duration of one stream.
struct Decompressor(*mut sys::libdeflate_gdeflate_decompressor);

impl Decompressor {
    fn new() -> io::Result<Self> {
        // SAFETY: allocation has no preconditions; null is checked below.
        let raw = unsafe { sys::libdeflate_alloc_gdeflate_decompressor() };
        if raw.is_null() {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "GDEFLATE decompressor"));
        }
        Ok(Self(raw))
    }

    /// Inflate one tile into `out`, which must be sized to the tile exactly.
    fn tile(&mut self, tile: &[u8], out: &mut [u8]) -> io::Result<()> {
        let mut page = sys::libdeflate_gdeflate_in_page {
            data: tile.as_ptr().cast(),
            nbytes: tile.len(),
        };
        let mut written = 0usize;
        // SAFETY: `page` describes `tile` and `out` is writable for its full
        // length; libdeflate reads and writes only within those bounds.
        let result = unsafe {
            sys::libdeflate_gdeflate_decompress(
                self.0,
                &mut page,
                1,
                out.as_mut_ptr().cast(),
                out.len(),
                &mut written,
            )
        };
        if result != sys::libdeflate_result_LIBDEFLATE_SUCCESS || written != out.len() {
            return Err(invalid(format!(
                "tile inflated to {written} of {} bytes (libdeflate result {result})",
                out.len()
            )));
        }
        Ok(())
    }
}

impl Drop for Decompressor {
    fn drop(&mut self) {
        // SAFETY: the pointer came from the matching alloc and is freed once.
        unsafe { sys::libdeflate_free_gdeflate_decompressor(self.0) }
    }
}

impl TileStreamDecoder for GDeflateDecoder {
    fn decompress(&self, tile_stream: &[u8], output_size: usize) -> io::Result<Vec<u8>> {
        let mut reader = BinaryReader::new(tile_stream);
        let header = read_header(&mut reader)?;
        let total = header.uncompressed_size();
        if total != output_size {
            return Err(invalid(format!(
                "tile stream holds {total} bytes, entry declares {output_size}"
            )));
        }

        let offsets = (0..header.tile_count)
            .map(|_| reader.read_u32().map(|o| o as usize))
            .collect::<scs_common::Result<Vec<_>>>()
            .map_err(|e| invalid(e.to_string()))?;
        let data = reader.remaining_bytes();

        let mut decompressor = Decompressor::new()?;
        let mut output = vec![0u8; total];
        for (index, out) in output.chunks_mut(TILE_SIZE).enumerate() {
            let start = if index == 0 { 0 } else { offsets[index] };
            let end = match offsets.get(index + 1) {
                Some(&next) => next,
                None => start + offsets[0],
            };
            let tile = data.get(start..end).ok_or_else(|| {
                invalid(format!(
                    "tile {index} spans {start}..{end} of {} data bytes",
                    data.len()
                ))
            })?;
            decompressor.tile(tile, out)?;
        }
        Ok(output)
    }
}

/// Build a tile stream with the given wrapper in front, for tests.
#[cfg(test)]
pub(crate) fn encode(wrapper: &[u8], data: &[u8]) -> Vec<u8> {
    let mut compressor = gdeflate::Compressor::new(gdeflate::CompressionLevel::Level9).unwrap();
    let compressed = compressor.compress(data, TILE_SIZE).unwrap();

    let tile_count = compressed.tiles.len();
    let last_tile_size = data.len() - (tile_count - 1) * TILE_SIZE;
    let mut offsets = vec![0u32; tile_count];
    let mut running = 0u32;
    for (i, tile) in compressed.tiles.iter().enumerate() {
        if i > 0 {
            offsets[i] = running;
        }
        running += tile.compressed_size;
    }
    offsets[0] = compressed.tiles[tile_count - 1].compressed_size;

    let mut out = wrapper.to_vec();
    out.push(STREAM_ID);
    out.push(STREAM_ID ^ 0xFF);
    out.extend_from_slice(&(tile_count as u16).to_le_bytes());
    out.extend_from_slice(&(1 | ((last_tile_size as u32) << 2)).to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&compressed.bytes);
    out
}
