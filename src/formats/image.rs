//! The shared compressed-image container used by `.PIC` files and by the
//! images embedded in catalogs and animations.
//!
//! Layout: format flag (u16), width (u16), height (u16), an optional
//! 16-byte CGA remap table, the LZW dictionary width byte, then the
//! compressed pixel payload. The payload carries no length field; its
//! extent is discovered by decompressing until the pixel target implied
//! by the dimensions is met.

use std::io::Cursor;

use image::RgbaImage;

use crate::binary_utils::{read_bytes, read_u8, read_u16_le, write_u16_le};
use crate::compression::{compress_payload, decompress_payload};
use crate::compression::lzw::{CODE_WIDTH_MAX, CODE_WIDTH_MIN};
use crate::error::{AssetError, Result};
use crate::graphics::{palette, pixels};

/// VGA pixel data only.
pub const FORMAT_VGA: u16 = 0x07;
/// VGA pixel data plus a 16-byte CGA remap table.
pub const FORMAT_VGA_CGA: u16 = 0x0F;

/// Width the writer declares for the LZW dictionary.
const DICTIONARY_WIDTH: u8 = 11;

/// A decoded image: one VGA palette index per pixel, plus the CGA remap
/// table when the source carried one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedImage {
    pub width: u16,
    pub height: u16,
    pub cga_remap: Option<[u8; 16]>,
    pub pixels: Vec<u8>,
}

impl SharedImage {
    pub fn new(
        width: u16,
        height: u16,
        pixels: Vec<u8>,
        cga_remap: Option<[u8; 16]>,
    ) -> Result<SharedImage> {
        if pixels.len() != width as usize * height as usize {
            return Err(AssetError::PixelCountMismatch {
                expected: width as usize * height as usize,
                got: pixels.len(),
            });
        }
        Ok(SharedImage {
            width,
            height,
            cga_remap,
            pixels,
        })
    }

    /// Parse an image at the cursor's position, leaving the cursor just
    /// past the compressed payload so container formats can continue
    /// reading after an embedded image.
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<SharedImage> {
        let flag = read_u16_le(cursor)?;
        let has_remap = match flag {
            FORMAT_VGA => false,
            FORMAT_VGA_CGA => true,
            _ => return Err(AssetError::UnsupportedFormat(flag)),
        };

        let width = read_u16_le(cursor)?;
        let height = read_u16_le(cursor)?;
        let cga_remap = if has_remap {
            let table = read_bytes(cursor, 16)?;
            let mut remap = [0u8; 16];
            remap.copy_from_slice(&table);
            Some(remap)
        } else {
            None
        };
        let dict_width = read_u8(cursor)?;
        if !(CODE_WIDTH_MIN..=CODE_WIDTH_MAX).contains(&u32::from(dict_width)) {
            return Err(AssetError::BadDictionaryWidth(dict_width));
        }

        let target = pixels::packed_len(width as usize, height as usize);
        let payload = &cursor.get_ref()[cursor.position() as usize..];
        let (packed, consumed) =
            decompress_payload(payload, target, u32::from(dict_width))?;
        cursor.set_position(cursor.position() + consumed as u64);

        let pixels = pixels::unpack(&packed, width as usize, height as usize)?;
        Ok(SharedImage {
            width,
            height,
            cga_remap,
            pixels,
        })
    }

    pub fn from_bytes(data: &[u8]) -> Result<SharedImage> {
        SharedImage::parse(&mut Cursor::new(data))
    }

    /// Serialize into `out`.
    ///
    /// An odd width is stored rounded up by one; the pad column the
    /// packing stage inserts becomes a real column of index 0 when the
    /// file is read back. The original writer had the same quirk.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let flag = if self.cga_remap.is_some() {
            FORMAT_VGA_CGA
        } else {
            FORMAT_VGA
        };
        write_u16_le(out, flag);
        let stored_width = u32::from(self.width) + u32::from(self.width & 1);
        if stored_width > u32::from(u16::MAX) {
            return Err(AssetError::UnstorableWidth(self.width));
        }
        write_u16_le(out, stored_width as u16);
        write_u16_le(out, self.height);
        if let Some(remap) = &self.cga_remap {
            out.extend_from_slice(remap);
        }
        out.push(DICTIONARY_WIDTH);

        let packed = pixels::pack(&self.pixels, self.width as usize, self.height as usize)?;
        out.extend_from_slice(&compress_payload(&packed, u32::from(DICTIONARY_WIDTH)));
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Render with the fixed VGA palette.
    pub fn to_rgba(&self) -> Result<RgbaImage> {
        palette::vga_to_rgba(&self.pixels, u32::from(self.width), u32::from(self.height))
    }

    /// Render the CGA dithering preview, when a remap table is present.
    pub fn to_cga_rgba(&self) -> Result<Option<RgbaImage>> {
        match &self.cga_remap {
            Some(remap) => Ok(Some(palette::cga_to_rgba(
                &self.pixels,
                u32::from(self.width),
                u32::from(self.height),
                remap,
            )?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pixels(width: usize, height: usize) -> Vec<u8> {
        (0..width * height).map(|i| (i % 16) as u8).collect()
    }

    #[test]
    fn even_width_image_round_trips() {
        let image = SharedImage::new(8, 4, test_pixels(8, 4), None).unwrap();
        let bytes = image.to_bytes().unwrap();
        assert_eq!(SharedImage::from_bytes(&bytes).unwrap(), image);
    }

    #[test]
    fn cga_remap_table_round_trips() {
        let mut remap = [0u8; 16];
        for (i, entry) in remap.iter_mut().enumerate() {
            *entry = (i as u8) | 0x80;
        }
        let image = SharedImage::new(4, 4, test_pixels(4, 4), Some(remap)).unwrap();
        let bytes = image.to_bytes().unwrap();
        let back = SharedImage::from_bytes(&bytes).unwrap();
        assert_eq!(back.cga_remap, Some(remap));
        assert_eq!(back, image);
    }

    #[test]
    fn odd_width_is_stored_rounded_up() {
        let image = SharedImage::new(3, 2, vec![1, 2, 3, 4, 5, 6], None).unwrap();
        let bytes = image.to_bytes().unwrap();
        let back = SharedImage::from_bytes(&bytes).unwrap();
        assert_eq!(back.width, 4);
        // The pad column reads back as index 0.
        assert_eq!(back.pixels, vec![1, 2, 3, 0, 4, 5, 6, 0]);

        // The widened image is a fixed point: its bytes round-trip exactly.
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn dictionary_width_past_the_cap_is_fatal() {
        let image = SharedImage::new(4, 4, test_pixels(4, 4), None).unwrap();
        let mut bytes = image.to_bytes().unwrap();
        // Dictionary width byte sits after flag, width and height.
        bytes[6] = 12;
        assert!(matches!(
            SharedImage::from_bytes(&bytes),
            Err(AssetError::BadDictionaryWidth(12))
        ));
    }

    #[test]
    fn maximum_odd_width_cannot_be_stored() {
        let image = SharedImage::new(u16::MAX, 0, Vec::new(), None).unwrap();
        assert!(matches!(
            image.to_bytes(),
            Err(AssetError::UnstorableWidth(u16::MAX))
        ));
    }

    #[test]
    fn unknown_format_flag_is_fatal() {
        let image = SharedImage::new(2, 2, vec![1, 2, 3, 4], None).unwrap();
        let mut bytes = image.to_bytes().unwrap();
        bytes[0] = 0x03;
        assert!(matches!(
            SharedImage::from_bytes(&bytes),
            Err(AssetError::UnsupportedFormat(0x03))
        ));
    }

    #[test]
    fn parse_leaves_cursor_after_payload() {
        let image = SharedImage::new(6, 6, test_pixels(6, 6), None).unwrap();
        let mut bytes = image.to_bytes().unwrap();
        let payload_end = bytes.len();
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let mut cursor = Cursor::new(bytes.as_slice());
        let back = SharedImage::parse(&mut cursor).unwrap();
        assert_eq!(back, image);
        assert_eq!(cursor.position() as usize, payload_end);
    }
}
