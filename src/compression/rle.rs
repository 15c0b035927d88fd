//! Run-length layer applied to the packed-nibble byte stream before LZW.
//!
//! The escape byte is 0x90. `0x90 0x00` encodes a literal 0x90 (the only
//! legal way to store one); `0x90 N` repeats the previously decoded byte
//! N-2 additional times. Runs of one to three bytes are stored as plain
//! literals; the legacy encoder considers RLE worthless at those lengths.

use crate::error::{AssetError, Result};

pub const RLE_ESCAPE: u8 = 0x90;

/// Longest repeat count a single code can carry (the count byte caps the
/// stored value at 255).
const MAX_REPEATS: usize = 253;

fn push_literal(out: &mut Vec<u8>, byte: u8) {
    out.push(byte);
    if byte == RLE_ESCAPE {
        out.push(0x00);
    }
}

/// Run-length encode a packed pixel-pair stream.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];

        // Count duplicates following the first byte. The escape byte is
        // never run-counted, only escaped.
        let mut r = 0usize;
        if b != RLE_ESCAPE {
            while r < MAX_REPEATS && i + r + 1 < data.len() && data[i + r + 1] == b {
                r += 1;
            }
        }

        if r <= 2 {
            // Too short for a code: up to three literals.
            for _ in 0..=r {
                push_literal(&mut out, b);
            }
            i += r + 1;
        } else if i + r + 1 == data.len() {
            // The run swallows the final byte of the stream: pure RLE code
            // with no trailing literal.
            out.push(b);
            out.push(RLE_ESCAPE);
            out.push((r + 2) as u8);
            i += r + 1;
        } else {
            // Interior run: code plus trailing literal. The unit accounts
            // for exactly the r bytes it consumes; the leftover run byte is
            // re-scanned on the next iteration.
            out.push(b);
            out.push(RLE_ESCAPE);
            out.push(r as u8);
            out.push(b);
            i += r;
        }
    }
    out
}

/// Incremental decoder, fed one byte at a time. The LZW stage pushes each
/// expanded word through this so an embedded image can stop at its exact
/// packed-byte target.
pub struct RleDecoder {
    out: Vec<u8>,
    escape_pending: bool,
}

impl RleDecoder {
    pub fn new() -> Self {
        RleDecoder {
            out: Vec::new(),
            escape_pending: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.escape_pending {
            self.escape_pending = false;
            if byte == 0x00 {
                self.out.push(RLE_ESCAPE);
            } else {
                let prev = *self
                    .out
                    .last()
                    .ok_or(AssetError::RepeatWithoutPrevious)?;
                for _ in 0..byte.saturating_sub(2) {
                    self.out.push(prev);
                }
            }
        } else if byte == RLE_ESCAPE {
            self.escape_pending = true;
        } else {
            self.out.push(byte);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Finish decoding. A dangling escape byte means a truncated stream.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.escape_pending {
            return Err(AssetError::TruncatedBitstream);
        }
        Ok(self.out)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }
}

impl Default for RleDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a complete run-length encoded buffer.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = RleDecoder::new();
    for &byte in data {
        decoder.push(byte)?;
    }
    decoder.finish()
}
