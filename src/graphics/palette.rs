//! Fixed 16-colour VGA palette and the RGBA/CGA preview conversions.

use image::{Rgba, RgbaImage};

use crate::error::{AssetError, Result};

/// The classic 16-entry VGA text palette the original engine renders with.
/// Index 0 doubles as the transparent colour in sprite assets.
pub const VGA_PALETTE: [[u8; 4]; 16] = [
    [0x00, 0x00, 0x00, 0xFF], // black
    [0x00, 0x00, 0xAA, 0xFF], // blue
    [0x00, 0xAA, 0x00, 0xFF], // green
    [0x00, 0xAA, 0xAA, 0xFF], // cyan
    [0xAA, 0x00, 0x00, 0xFF], // red
    [0xAA, 0x00, 0xAA, 0xFF], // magenta
    [0xAA, 0x55, 0x00, 0xFF], // brown
    [0xAA, 0xAA, 0xAA, 0xFF], // light grey
    [0x55, 0x55, 0x55, 0xFF], // dark grey
    [0x55, 0x55, 0xFF, 0xFF], // light blue
    [0x55, 0xFF, 0x55, 0xFF], // light green
    [0x55, 0xFF, 0xFF, 0xFF], // light cyan
    [0xFF, 0x55, 0x55, 0xFF], // light red
    [0xFF, 0x55, 0xFF, 0xFF], // light magenta
    [0xFF, 0xFF, 0x55, 0xFF], // yellow
    [0xFF, 0xFF, 0xFF, 0xFF], // white
];

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

fn palette_colour(index: u8) -> Result<[u8; 4]> {
    VGA_PALETTE
        .get(index as usize)
        .copied()
        .ok_or(AssetError::BadPaletteIndex(index))
}

/// Render a palette-index buffer as an RGBA image. Index 0 becomes a
/// transparent pixel.
pub fn vga_to_rgba(pixels: &[u8], width: u32, height: u32) -> Result<RgbaImage> {
    if pixels.len() != (width * height) as usize {
        return Err(AssetError::PixelCountMismatch {
            expected: (width * height) as usize,
            got: pixels.len(),
        });
    }

    let mut img = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let index = pixels[(y * width + x) as usize];
            let colour = if index == 0 {
                TRANSPARENT
            } else {
                palette_colour(index)?
            };
            img.put_pixel(x, y, Rgba(colour));
        }
    }
    Ok(img)
}

/// Render the CGA dithering preview of a palette-index buffer.
///
/// Each remap byte holds two candidate colours, one per nibble; the
/// screen-position parity `(x + y) % 2` picks between them, giving the
/// chequerboard approximation the original engine shows on CGA displays.
/// Index 0 stays transparent no matter what the remap table says.
pub fn cga_to_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    remap: &[u8; 16],
) -> Result<RgbaImage> {
    if pixels.len() != (width * height) as usize {
        return Err(AssetError::PixelCountMismatch {
            expected: (width * height) as usize,
            got: pixels.len(),
        });
    }

    let mut img = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let index = pixels[(y * width + x) as usize];
            if index as usize >= VGA_PALETTE.len() {
                return Err(AssetError::BadPaletteIndex(index));
            }
            let colour = if index == 0 {
                TRANSPARENT
            } else {
                let pair = remap[index as usize];
                let nibble = if (x + y) % 2 == 0 {
                    pair & 0x0F
                } else {
                    pair >> 4
                };
                palette_colour(nibble)?
            };
            img.put_pixel(x, y, Rgba(colour));
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_zero_is_transparent() {
        let img = vga_to_rgba(&[0, 15], 2, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, TRANSPARENT);
        assert_eq!(img.get_pixel(1, 0).0, [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn out_of_range_index_is_fatal() {
        assert!(matches!(
            vga_to_rgba(&[16], 1, 1),
            Err(AssetError::BadPaletteIndex(16))
        ));
    }

    #[test]
    fn cga_parity_alternates_nibbles() {
        // Remap entry for index 1: low nibble white, high nibble black.
        let mut remap = [0u8; 16];
        remap[1] = 0x8F;
        let img = cga_to_rgba(&[1, 1, 1, 1], 2, 2, &remap).unwrap();
        // (0,0) and (1,1) have even parity, (1,0) and (0,1) odd.
        assert_eq!(img.get_pixel(0, 0).0, VGA_PALETTE[0x0F]);
        assert_eq!(img.get_pixel(1, 1).0, VGA_PALETTE[0x0F]);
        assert_eq!(img.get_pixel(1, 0).0, VGA_PALETTE[0x08]);
        assert_eq!(img.get_pixel(0, 1).0, VGA_PALETTE[0x08]);
    }
}
