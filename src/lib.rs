//! Codec for the legacy PIC/CAT/PAN asset formats.
//!
//! The pixel pipeline packs two 4-bit VGA palette indices per byte,
//! run-length encodes the result, then LZW-compresses the RLE stream
//! with variable-width codes. The format codecs wrap that pipeline in
//! the three container layouts the original engine shipped: single
//! images (`.PIC`), named image catalogs (`.CAT`) and animations
//! (`.PAN`) with their stack-machine bytecode.
//!
//! Everything operates on in-memory byte buffers; callers own file I/O.

pub mod binary_utils;
pub mod compression;
pub mod error;
pub mod formats;
pub mod graphics;

pub use error::{AssetError, Result};
