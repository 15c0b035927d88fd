//! `.PAN` animation containers.
//!
//! Layout: "PANI" magic, a 5-byte variant tag, a 15-entry colour remap
//! table, 5 reserved zero bytes, bounding width/height (stored minus
//! one), a frame-skip byte and a background descriptor, then the 250-slot
//! logical-image table, the embedded images it references, and finally
//! the bytecode data section with its length declared in 16-byte units.

use std::io::Cursor;

use log::warn;

use crate::binary_utils::{
    align_to_even, pad_to_even, read_bytes, read_u8, read_u16_le, remaining, write_u16_le,
};
use crate::error::{AssetError, Result};
use crate::formats::image::SharedImage;
use crate::formats::script::Script;

const MAGIC: &[u8; 4] = b"PANI";

/// Tag carried by the files this tool was written against. Other legacy
/// variants differ; the mismatch is only worth a warning.
pub const DEFAULT_TAG: [u8; 5] = [0x01, 0x00, 0x00, 0x00, 0x00];

/// Number of logical image ids an animation can address.
pub const SLOT_COUNT: usize = 250;

const BACKGROUND_CLEAR_TO_COLOR: u8 = 0x00;
const BACKGROUND_CLEAR_TO_IMAGE: u8 = 0x01;

/// What the engine paints before the first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    ClearToColor { color: u8, unknown: u8 },
    /// The image occupies the logical slot before slot 0.
    ClearToImage(SharedImage),
    Other(u8),
}

impl Background {
    fn kind(&self) -> u8 {
        match self {
            Background::ClearToColor { .. } => BACKGROUND_CLEAR_TO_COLOR,
            Background::ClearToImage(_) => BACKGROUND_CLEAR_TO_IMAGE,
            Background::Other(kind) => *kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    pub tag: [u8; 5],
    pub color_remap: [u8; 15],
    pub width: u16,
    pub height: u16,
    pub frame_skip: u8,
    pub background: Background,
    /// Raw slot table values. Zero marks an unused logical id; any other
    /// value assigns the id the next physical image and is otherwise kept
    /// as opaque authoring data.
    pub slots: Vec<u16>,
    /// Embedded images in file order.
    pub images: Vec<SharedImage>,
    pub script: Script,
}

impl Animation {
    pub fn from_bytes(data: &[u8]) -> Result<Animation> {
        let mut cursor = Cursor::new(data);

        let raw_magic = read_bytes(&mut cursor, 4)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&raw_magic);
        if &magic != MAGIC {
            return Err(AssetError::BadMagic(magic));
        }

        let raw_tag = read_bytes(&mut cursor, 5)?;
        let mut tag = [0u8; 5];
        tag.copy_from_slice(&raw_tag);
        if tag != DEFAULT_TAG {
            warn!("unexpected animation tag {:02X?}", tag);
        }

        let raw_remap = read_bytes(&mut cursor, 15)?;
        let mut color_remap = [0u8; 15];
        color_remap.copy_from_slice(&raw_remap);

        if read_bytes(&mut cursor, 5)?.iter().any(|&b| b != 0) {
            return Err(AssetError::NonZeroPadding);
        }

        let width = read_u16_le(&mut cursor)?.wrapping_add(1);
        let height = read_u16_le(&mut cursor)?.wrapping_add(1);
        let frame_skip = read_u8(&mut cursor)?;

        let background = match read_u8(&mut cursor)? {
            BACKGROUND_CLEAR_TO_COLOR => Background::ClearToColor {
                color: read_u8(&mut cursor)?,
                unknown: read_u8(&mut cursor)?,
            },
            BACKGROUND_CLEAR_TO_IMAGE => {
                align_to_even(&mut cursor)?;
                Background::ClearToImage(SharedImage::parse(&mut cursor)?)
            }
            kind => Background::Other(kind),
        };

        let mut slots = Vec::with_capacity(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            slots.push(read_u16_le(&mut cursor)?);
        }

        // A corrupt image here is fatal for the whole animation: with no
        // per-image length field the next image's position is unknowable.
        // The error names the failing index so callers can report which
        // image broke.
        let image_count = slots.iter().filter(|&&slot| slot != 0).count();
        let mut images = Vec::with_capacity(image_count);
        for index in 0..image_count {
            align_to_even(&mut cursor)?;
            let image =
                SharedImage::parse(&mut cursor).map_err(|source| AssetError::AnimationImage {
                    index,
                    source: Box::new(source),
                })?;
            images.push(image);
        }

        let declared = read_u16_le(&mut cursor)? as usize * 16;
        let actual = remaining(&cursor);
        if declared != actual {
            return Err(AssetError::DataSectionMismatch { declared, actual });
        }
        let script = Script::parse(&data[cursor.position() as usize..])?;

        Ok(Animation {
            tag,
            color_remap,
            width,
            height,
            frame_skip,
            background,
            slots,
            images,
            script,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let assigned = self.slots.iter().filter(|&&slot| slot != 0).count();
        if assigned != self.images.len() {
            warn!(
                "slot table assigns {} images but {} are present",
                assigned,
                self.images.len()
            );
        }

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.color_remap);
        out.extend_from_slice(&[0u8; 5]);
        write_u16_le(&mut out, self.width.saturating_sub(1));
        write_u16_le(&mut out, self.height.saturating_sub(1));
        out.push(self.frame_skip);

        out.push(self.background.kind());
        match &self.background {
            Background::ClearToColor { color, unknown } => {
                out.push(*color);
                out.push(*unknown);
            }
            Background::ClearToImage(image) => {
                pad_to_even(&mut out);
                image.write(&mut out)?;
            }
            Background::Other(_) => {}
        }

        for index in 0..SLOT_COUNT {
            write_u16_le(&mut out, self.slots.get(index).copied().unwrap_or(0));
        }
        for image in &self.images {
            pad_to_even(&mut out);
            image.write(&mut out)?;
        }

        let data = self.script.to_bytes();
        write_u16_le(&mut out, (data.len() / 16) as u16);
        out.extend_from_slice(&data);
        Ok(out)
    }

    /// Look up the image assigned to a logical slot id, following the
    /// sparse table's sequential numbering.
    pub fn image_for_slot(&self, id: usize) -> Option<&SharedImage> {
        if *self.slots.get(id)? == 0 {
            return None;
        }
        let physical = self.slots[..id].iter().filter(|&&slot| slot != 0).count();
        self.images.get(physical)
    }
}
