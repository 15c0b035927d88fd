//! `.CAT` catalogs: a directory of named compressed images.
//!
//! The file opens with an entry count, then one directory record per
//! image (12-byte zero-padded name, u32 offset, u32 length), then the
//! image blobs themselves, each 2-byte aligned. An entry whose image
//! fails to parse is skipped with a warning; the rest of the catalog
//! stays usable.

use std::io::Cursor;

use log::warn;

use crate::binary_utils::{pad_to_even, read_bytes, read_u16_le, read_u32_le, write_u16_le, write_u32_le};
use crate::error::{AssetError, Result};
use crate::formats::image::SharedImage;

pub const NAME_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub image: SharedImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn entry_image(data: &[u8], name: &str, offset: usize, length: usize) -> Result<SharedImage> {
    let end = offset.checked_add(length).filter(|&end| end <= data.len());
    let end = end.ok_or_else(|| AssetError::CatalogEntryOutOfBounds {
        name: name.to_string(),
        offset,
        length,
    })?;
    SharedImage::from_bytes(&data[offset..end])
}

impl Catalog {
    pub fn from_bytes(data: &[u8]) -> Result<Catalog> {
        let mut cursor = Cursor::new(data);
        let count = read_u16_le(&mut cursor)?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw_name = read_bytes(&mut cursor, NAME_LEN)?;
            let name = decode_name(&raw_name);
            let offset = read_u32_le(&mut cursor)? as usize;
            let length = read_u32_le(&mut cursor)? as usize;
            match entry_image(data, &name, offset, length) {
                Ok(image) => entries.push(CatalogEntry { name, image }),
                Err(err) => warn!("skipping catalog entry '{}': {}", name, err),
            }
        }
        Ok(Catalog { entries })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut blobs = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            blobs.push(entry.image.to_bytes()?);
        }

        let directory_len = 2 + self.entries.len() * (NAME_LEN + 8);
        let mut out = Vec::with_capacity(directory_len + blobs.iter().map(Vec::len).sum::<usize>());
        write_u16_le(&mut out, self.entries.len() as u16);

        let mut position = directory_len;
        for (entry, blob) in self.entries.iter().zip(&blobs) {
            position += position & 1;
            let mut name = [0u8; NAME_LEN];
            let bytes = entry.name.as_bytes();
            let len = bytes.len().min(NAME_LEN);
            name[..len].copy_from_slice(&bytes[..len]);
            out.extend_from_slice(&name);
            write_u32_le(&mut out, position as u32);
            write_u32_le(&mut out, blob.len() as u32);
            position += blob.len();
        }
        for blob in &blobs {
            pad_to_even(&mut out);
            out.extend_from_slice(blob);
        }
        Ok(out)
    }
}
