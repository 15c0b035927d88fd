//! The LZW variant used by the legacy asset files.
//!
//! Codes start at 9 bits and grow one bit at a time as the dictionary
//! fills, up to the width declared in the image header. When the
//! dictionary reaches the width limit both sides throw it away and start
//! over at 9 bits. Code 0x100 is never assigned; the original encoder
//! reserved it and then never used it, so a stream containing it is
//! corrupt.

use std::collections::HashMap;

use crate::compression::bitstream::{BitReader, BitWriter};
use crate::error::{AssetError, Result};

pub const CODE_WIDTH_MIN: u32 = 9;
/// Widest code the 2048-entry dictionary can require.
pub const CODE_WIDTH_MAX: u32 = 11;
pub const MAX_DICTIONARY: usize = 1 << CODE_WIDTH_MAX;
const SKIPPED_CODE: u16 = 0x100;
const FIRST_DYNAMIC_CODE: u16 = 0x101;

/// Produce the raw (code, width) sequence for `data`.
///
/// Split out from [`compress`] so the code stream itself can be inspected
/// without unpacking bits.
fn compress_codes(data: &[u8], max_width: u32) -> Vec<(u16, u32)> {
    let mut codes = Vec::new();
    if data.is_empty() {
        return codes;
    }

    let mut dict: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next = FIRST_DYNAMIC_CODE;
    let mut width = CODE_WIDTH_MIN;
    let mut cur = data[0] as u16;

    for &k in &data[1..] {
        if let Some(&code) = dict.get(&(cur, k)) {
            cur = code;
            continue;
        }
        codes.push((cur, width));
        if (next as usize) >= (1 << max_width) {
            // Dictionary full: restart from scratch. The pending byte
            // becomes the seed of the next sequence and no entry is
            // recorded for it.
            dict.clear();
            next = FIRST_DYNAMIC_CODE;
            width = CODE_WIDTH_MIN;
            cur = k as u16;
            continue;
        }
        // The first time through this pairs the first two input bytes,
        // which is the legacy coder's explicit priming entry.
        dict.insert((cur, k), next);
        next += 1;
        if (next as u32) >= (1 << width) && width < max_width {
            width += 1;
        }
        cur = k as u16;
    }
    codes.push((cur, width));
    codes
}

/// Compress `data` into a bit-packed code stream.
pub fn compress(data: &[u8], max_width: u32) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for (code, width) in compress_codes(data, max_width) {
        writer.write_code(code, width);
    }
    writer.finish()
}

/// Streaming decompressor.
///
/// Embedded image payloads carry no length field; the caller pulls one
/// word at a time until its pixel target is met, then asks
/// [`Decompressor::bytes_consumed`] how far the payload reached.
pub struct Decompressor<'a> {
    reader: BitReader<'a>,
    max_width: u32,
    width: u32,
    next: usize,
    prev: Option<u16>,
    prefix: Vec<u16>,
    suffix: Vec<u8>,
}

impl<'a> Decompressor<'a> {
    pub fn new(data: &'a [u8], max_width: u32) -> Self {
        Decompressor {
            reader: BitReader::new(data),
            max_width,
            width: CODE_WIDTH_MIN,
            next: FIRST_DYNAMIC_CODE as usize,
            prev: None,
            prefix: vec![0; MAX_DICTIONARY],
            suffix: vec![0; MAX_DICTIONARY],
        }
    }

    /// Whole bytes of payload consumed so far, trailing bit padding
    /// included once the final code has been read.
    pub fn bytes_consumed(&self) -> usize {
        self.reader.bytes_consumed()
    }

    fn first_byte(&self, mut code: u16) -> u8 {
        while code >= FIRST_DYNAMIC_CODE {
            code = self.prefix[code as usize];
        }
        code as u8
    }

    fn expand(&self, code: u16, out: &mut Vec<u8>) {
        let mut stack = Vec::new();
        let mut code = code;
        while code >= FIRST_DYNAMIC_CODE {
            stack.push(self.suffix[code as usize]);
            code = self.prefix[code as usize];
        }
        out.push(code as u8);
        while let Some(byte) = stack.pop() {
            out.push(byte);
        }
    }

    fn insert(&mut self, prev: u16, byte: u8) -> Result<()> {
        // Unreachable for streams honouring the 11-bit cap, where the
        // reset fires first; a wider declared width lands here.
        if self.next >= MAX_DICTIONARY {
            return Err(AssetError::DictionaryOverflow {
                code: self.next as u16,
                limit: MAX_DICTIONARY,
            });
        }
        self.prefix[self.next] = prev;
        self.suffix[self.next] = byte;
        self.next += 1;
        Ok(())
    }

    /// Decode the next word into `out`. Returns `Ok(false)` once only bit
    /// padding remains.
    pub fn next_word(&mut self, out: &mut Vec<u8>) -> Result<bool> {
        if self.reader.remaining_bits() < self.width as usize {
            return Ok(false);
        }
        let code = self.reader.read_code(self.width)?;

        if code == SKIPPED_CODE {
            return Err(AssetError::InvalidCode(code));
        }
        if (code as usize) >= MAX_DICTIONARY {
            return Err(AssetError::DictionaryOverflow {
                code,
                limit: MAX_DICTIONARY,
            });
        }
        if code >= FIRST_DYNAMIC_CODE && (code as usize) > self.next {
            return Err(AssetError::InvalidCode(code));
        }

        if code >= FIRST_DYNAMIC_CODE && (code as usize) == self.next {
            // The encoder can emit a code one step ahead of our table; its
            // expansion is the previous word plus that word's first byte.
            let prev = self.prev.ok_or(AssetError::InvalidCode(code))?;
            let first = self.first_byte(prev);
            self.insert(prev, first)?;
            self.expand(code, out);
        } else {
            self.expand(code, out);
            if let Some(prev) = self.prev {
                let first = self.first_byte(code);
                self.insert(prev, first)?;
            }
        }
        self.prev = Some(code);

        if self.next >= (1 << self.max_width) {
            // Mirror of the encoder's restart. Stale table rows above
            // `next` are unreachable because codes past it are rejected.
            self.next = FIRST_DYNAMIC_CODE as usize;
            self.width = CODE_WIDTH_MIN;
            self.prev = None;
        } else if self.next + 1 >= (1 << self.width) && self.width < self.max_width {
            // The decoder's table runs one entry behind the encoder's, so
            // the width changes one entry early.
            self.width += 1;
        }
        Ok(true)
    }
}

/// Decompress a complete code stream.
pub fn decompress(data: &[u8], max_width: u32) -> Result<Vec<u8>> {
    let mut decompressor = Decompressor::new(data, max_width);
    let mut out = Vec::new();
    while decompressor.next_word(&mut out)? {}
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_data(len: usize) -> Vec<u8> {
        // Deterministic pseudo-random bytes, varied enough to churn the
        // dictionary.
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn empty_input_round_trips() {
        assert!(compress(&[], 11).is_empty());
        assert!(decompress(&[], 11).unwrap().is_empty());
    }

    #[test]
    fn single_byte_round_trips() {
        let encoded = compress(&[0x42], 11);
        assert_eq!(decompress(&encoded, 11).unwrap(), vec![0x42]);
    }

    #[test]
    fn repeated_bytes_round_trip() {
        // Exercises the code-one-ahead expansion path.
        let input = vec![0x61; 64];
        let encoded = compress(&input, 11);
        assert_eq!(decompress(&encoded, 11).unwrap(), input);
    }

    #[test]
    fn noisy_data_round_trips() {
        let input = noisy_data(4096);
        let encoded = compress(&input, 11);
        assert_eq!(decompress(&encoded, 11).unwrap(), input);
    }

    #[test]
    fn dictionary_restart_round_trips() {
        // A 9-bit cap fills the dictionary after 255 entries, forcing
        // several restarts over this input.
        let input = noisy_data(8192);
        let encoded = compress(&input, 9);
        assert_eq!(decompress(&encoded, 9).unwrap(), input);
    }

    #[test]
    fn compression_is_deterministic() {
        let input = noisy_data(2048);
        assert_eq!(compress(&input, 11), compress(&input, 11));
    }

    #[test]
    fn code_0x100_is_never_emitted() {
        for input in [noisy_data(8192), vec![0x07; 8192]] {
            for (code, _) in compress_codes(&input, 9) {
                assert_ne!(code, SKIPPED_CODE);
            }
        }
    }

    #[test]
    fn width_past_the_dictionary_cap_is_an_error() {
        // A 12-bit width would need a 4096-entry table; the decompressor
        // must refuse at the 2048 bound rather than index past it.
        let input = noisy_data(8192);
        let encoded = compress(&input, 12);
        assert!(matches!(
            decompress(&encoded, 12),
            Err(AssetError::DictionaryOverflow { .. })
        ));
    }

    #[test]
    fn code_0x100_is_rejected() {
        let mut writer = BitWriter::new();
        writer.write_code(0x41, CODE_WIDTH_MIN);
        writer.write_code(SKIPPED_CODE, CODE_WIDTH_MIN);
        let bytes = writer.finish();
        assert!(matches!(
            decompress(&bytes, 11),
            Err(AssetError::InvalidCode(SKIPPED_CODE))
        ));
    }

    #[test]
    fn unassigned_code_is_rejected() {
        let mut writer = BitWriter::new();
        writer.write_code(0x41, CODE_WIDTH_MIN);
        writer.write_code(0x1F0, CODE_WIDTH_MIN);
        let bytes = writer.finish();
        assert!(matches!(
            decompress(&bytes, 11),
            Err(AssetError::InvalidCode(0x1F0))
        ));
    }
}
