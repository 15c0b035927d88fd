//! Nibble packing for the 16-colour pixel format.
//!
//! Two 4-bit palette indices share one byte, first pixel in the low
//! nibble. Rows are byte aligned: an odd-width row ends with a synthetic
//! pad pixel, except the final row, which is left without one. The byte
//! counts come out the same either way, so the asymmetry only shows in
//! which nibbles carry real pixels.

use crate::error::{AssetError, Result};

/// Byte length of the packed form of a `width` x `height` pixel buffer.
pub fn packed_len(width: usize, height: usize) -> usize {
    height * ((width + 1) / 2)
}

/// Pack a flat buffer of palette indices (one per pixel, values 0-15)
/// into pixel-pair bytes.
pub fn pack(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    if pixels.len() != width * height {
        return Err(AssetError::PixelCountMismatch {
            expected: width * height,
            got: pixels.len(),
        });
    }

    let mut out = Vec::with_capacity(packed_len(width, height));
    for y in 0..height {
        let row = &pixels[y * width..(y + 1) * width];
        let mut x = 0;
        while x + 1 < width {
            out.push((row[x] & 0x0F) | (row[x + 1] << 4));
            x += 2;
        }
        if x < width {
            // Odd width: the dangling pixel takes the low nibble. The high
            // nibble is the pad pixel on every row but the last, where it
            // is plain zero fill.
            out.push(row[x] & 0x0F);
        }
    }
    Ok(out)
}

/// Unpack pixel-pair bytes back into one palette index per pixel.
pub fn unpack(packed: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let expected = packed_len(width, height);
    if packed.len() != expected {
        return Err(AssetError::PixelCountMismatch {
            expected,
            got: packed.len(),
        });
    }

    let row_bytes = (width + 1) / 2;
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = &packed[y * row_bytes..(y + 1) * row_bytes];
        for (i, &byte) in row.iter().enumerate() {
            out.push(byte & 0x0F);
            if 2 * i + 1 < width {
                out.push(byte >> 4);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_width_rows_are_padded() {
        let pixels = [1, 2, 3, 4, 5, 6];
        let packed = pack(&pixels, 3, 2).unwrap();
        assert_eq!(packed, vec![0x21, 0x03, 0x54, 0x06]);
        assert_eq!(unpack(&packed, 3, 2).unwrap(), pixels);
    }

    #[test]
    fn even_width_packs_tightly() {
        let pixels = [0xF, 0x0, 0x1, 0x2];
        let packed = pack(&pixels, 4, 1).unwrap();
        assert_eq!(packed, vec![0x0F, 0x21]);
        assert_eq!(unpack(&packed, 4, 1).unwrap(), pixels);
    }

    #[test]
    fn single_column_round_trips() {
        let pixels = [7, 8, 9];
        let packed = pack(&pixels, 1, 3).unwrap();
        assert_eq!(packed.len(), packed_len(1, 3));
        assert_eq!(unpack(&packed, 1, 3).unwrap(), pixels);
    }

    #[test]
    fn wrong_pixel_count_is_rejected() {
        assert!(matches!(
            pack(&[1, 2, 3], 2, 2),
            Err(AssetError::PixelCountMismatch {
                expected: 4,
                got: 3
            })
        ));
        assert!(matches!(
            unpack(&[0x21], 3, 2),
            Err(AssetError::PixelCountMismatch { .. })
        ));
    }
}
