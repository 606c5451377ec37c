//! BC1/BC2/BC3 block decompression to RGBA8.

/// Block-compressed formats with a decode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    /// DXT1, 8 bytes per block, 1-bit alpha.
    Bc1,
    /// DXT3, 16 bytes per block, explicit 4-bit alpha.
    Bc2,
    /// DXT5, 16 bytes per block, interpolated alpha.
    Bc3,
}

impl BlockFormat {
    pub const fn block_bytes(self) -> usize {
        match self {
            BlockFormat::Bc1 => 8,
            BlockFormat::Bc2 | BlockFormat::Bc3 => 16,
        }
    }
}

fn expand_565(c: u16) -> [u8; 3] {
    let r = ((c >> 11) & 0x1F) as u8;
    let g = ((c >> 5) & 0x3F) as u8;
    let b = (c & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

fn mix(a: [u8; 3], b: [u8; 3], wa: u16, wb: u16) -> [u8; 3] {
    let d = wa + wb;
    [0, 1, 2].map(|i| ((a[i] as u16 * wa + b[i] as u16 * wb) / d) as u8)
}

/// Decode the colour half of a block into 16 RGBA texels.
fn decode_colour(block: &[u8], allow_punch_through: bool, out: &mut [[u8; 4]; 16]) {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let e0 = expand_565(c0);
    let e1 = expand_565(c1);
    let mut palette = [[0u8; 4]; 4];
    palette[0] = [e0[0], e0[1], e0[2], 255];
    palette[1] = [e1[0], e1[1], e1[2], 255];
    if c0 > c1 || !allow_punch_through {
        let p2 = mix(e0, e1, 2, 1);
        let p3 = mix(e0, e1, 1, 2);
        palette[2] = [p2[0], p2[1], p2[2], 255];
        palette[3] = [p3[0], p3[1], p3[2], 255];
    } else {
        let p2 = mix(e0, e1, 1, 1);
        palette[2] = [p2[0], p2[1], p2[2], 255];
        palette[3] = [0, 0, 0, 0];
    }

    for (i, texel) in out.iter_mut().enumerate() {
        *texel = palette[((indices >> (2 * i)) & 0x3) as usize];
    }
}

fn decode_explicit_alpha(block: &[u8], out: &mut [[u8; 4]; 16]) {
    let bits = u64::from_le_bytes(block[..8].try_into().unwrap_or([0; 8]));
    for (i, texel) in out.iter_mut().enumerate() {
        texel[3] = ((bits >> (4 * i)) & 0xF) as u8 * 17;
    }
}

fn decode_interpolated_alpha(block: &[u8], out: &mut [[u8; 4]; 16]) {
    let a0 = block[0] as u16;
    let a1 = block[1] as u16;
    let mut palette = [0u8; 8];
    palette[0] = a0 as u8;
    palette[1] = a1 as u8;
    if a0 > a1 {
        for i in 1..7u16 {
            palette[i as usize + 1] = (((7 - i) * a0 + i * a1) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            palette[i as usize + 1] = (((5 - i) * a0 + i * a1) / 5) as u8;
        }
        palette[6] = 0;
        palette[7] = 255;
    }

    let mut bits = 0u64;
    for (i, b) in block[2..8].iter().enumerate() {
        bits |= (*b as u64) << (8 * i);
    }
    for (i, texel) in out.iter_mut().enumerate() {
        texel[3] = palette[((bits >> (3 * i)) & 0x7) as usize];
    }
}

/// Decode a whole surface into tightly packed RGBA8.
///
/// `data` must hold at least `ceil(w/4) * ceil(h/4)` blocks; texels of edge
/// blocks that fall outside the image are dropped.
pub fn decode_blocks(format: BlockFormat, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let blocks_x = width.div_ceil(4);
    let blocks_y = height.div_ceil(4);
    let mut rgba = vec![0u8; width * height * 4];
    let mut texels = [[0u8; 4]; 16];

    for (index, block) in data
        .chunks_exact(format.block_bytes())
        .take(blocks_x * blocks_y)
        .enumerate()
    {
        match format {
            BlockFormat::Bc1 => decode_colour(block, true, &mut texels),
            BlockFormat::Bc2 => {
                decode_colour(&block[8..], false, &mut texels);
                decode_explicit_alpha(block, &mut texels);
            }
            BlockFormat::Bc3 => {
                decode_colour(&block[8..], false, &mut texels);
                decode_interpolated_alpha(block, &mut texels);
            }
        }

        let bx = (index % blocks_x) * 4;
        let by = (index / blocks_x) * 4;
        for (i, texel) in texels.iter().enumerate() {
            let (x, y) = (bx + i % 4, by + i / 4);
            if x < width && y < height {
                let at = (y * width + x) * 4;
                rgba[at..at + 4].copy_from_slice(texel);
            }
        }
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bc1_solid_red() {
        // c0 = c1 = pure red, all indices 0
        let block = [0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0];
        let rgba = decode_blocks(BlockFormat::Bc1, 4, 4, &block);
        assert_eq!(rgba.len(), 64);
        for texel in rgba.chunks(4) {
            assert_eq!(texel, [255, 0, 0, 255]);
        }
    }

    #[test]
    fn test_bc1_punch_through_alpha() {
        // c0 <= c1 enables index 3 = transparent
        let block = [0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let rgba = decode_blocks(BlockFormat::Bc1, 4, 4, &block);
        assert_eq!(&rgba[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn test_bc2_explicit_alpha() {
        let mut block = [0u8; 16];
        block[0] = 0x0F; // texel 0 alpha 15, texel 1 alpha 0
        block[8..12].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let rgba = decode_blocks(BlockFormat::Bc2, 4, 4, &block);
        assert_eq!(rgba[3], 255);
        assert_eq!(rgba[7], 0);
        assert_eq!(&rgba[..3], [255, 255, 255]);
    }

    #[test]
    fn test_bc3_interpolated_alpha() {
        let mut block = [0u8; 16];
        block[0] = 255;
        block[1] = 0;
        // texel 0 index 1 (a1 = 0), texel 1 index 0 (a0 = 255)
        block[2] = 0b0000_0001;
        let rgba = decode_blocks(BlockFormat::Bc3, 4, 4, &block);
        assert_eq!(rgba[3], 0);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn test_partial_block_is_clipped() {
        let block = [0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0];
        let rgba = decode_blocks(BlockFormat::Bc1, 2, 3, &block);
        assert_eq!(rgba.len(), 2 * 3 * 4);
    }
}
