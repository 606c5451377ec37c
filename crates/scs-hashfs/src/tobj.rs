//! Rebuilding DDS files from header-less texture payloads.

use scs_dds::{dxgi, DdsHeader, DdsHeaderDxt10, DDS_MAGIC};
use zerocopy::IntoBytes;

use crate::schema::ImageMeta;
use crate::{Error, Result};

fn align(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// Whether stored rows carry pitch padding that a DDS reader would not expect.
fn has_row_padding(image: &ImageMeta) -> bool {
    dxgi::is_padded_rgba(image.format)
        && (!image.width.is_power_of_two() || !image.height.is_power_of_two())
}

/// Prefix `payload` with DDS and DX10 headers, removing row padding when needed.
pub fn build_dds(image: &ImageMeta, payload: &[u8]) -> Result<Vec<u8>> {
    let header = DdsHeader::dx10(
        image.width,
        image.height,
        image.mipmap_count,
        image.format,
        image.is_cube(),
    );
    let dx10 = DdsHeaderDxt10::texture_2d(image.format, image.count, image.is_cube());

    let mut out = Vec::with_capacity(4 + DdsHeader::SIZE as usize + 20 + payload.len());
    out.extend_from_slice(DDS_MAGIC);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(dx10.as_bytes());

    if has_row_padding(image) {
        strip_row_padding(image, payload, &mut out)?;
    } else {
        out.extend_from_slice(payload);
    }
    Ok(out)
}

/// Copy every surface of a 32-bit image with tightly packed rows.
fn strip_row_padding(image: &ImageMeta, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let faces = if image.is_cube() { 6 } else { 1 };
    let surfaces = image.count as usize * faces;
    let pitch_alignment = image.pitch_alignment as usize;
    let image_alignment = image.image_alignment as usize;

    let mut offset = 0usize;
    for _ in 0..surfaces {
        for level in 0..image.mipmap_count {
            let width = (image.width >> level).max(1) as usize;
            let height = (image.height >> level).max(1) as usize;
            let row = width * 4;
            let pitch = align(row, pitch_alignment);

            offset = align(offset, image_alignment);
            for y in 0..height {
                let start = offset + y * pitch;
                let bytes = payload.get(start..start + row).ok_or_else(|| {
                    Error::Format(format!(
                        "texture payload of {} bytes ends inside mip {level} row {y}",
                        payload.len()
                    ))
                })?;
                out.extend_from_slice(bytes);
            }
            offset += pitch * height;
        }
    }
    Ok(())
}
