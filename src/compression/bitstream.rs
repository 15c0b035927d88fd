use crate::error::{AssetError, Result};

/// Accumulates variable-width codes into a byte buffer, least significant
/// bit first. Completed bytes are flushed into the buffer as they fill.
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter {
            out: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    /// Append the low `width` bits of `value`, LSB first. `width` is 1..=16.
    pub fn write_code(&mut self, value: u16, width: u32) {
        debug_assert!(width >= 1 && width <= 16);
        self.acc |= (value as u32) << self.nbits;
        self.nbits += width;
        while self.nbits >= 8 {
            self.out.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    /// Flush the trailing partial byte (zero padded) and return the buffer.
    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.out.push((self.acc & 0xFF) as u8);
        }
        self.out
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirror of [`BitWriter`]: extracts variable-width codes from a byte
/// buffer. Fresh bytes are OR'd into the top of the accumulator and codes
/// are shifted out of the bottom.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            pos: 0,
            acc: 0,
            nbits: 0,
        }
    }

    /// Bits still available, counting the partially consumed byte.
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() - self.pos) * 8 + self.nbits as usize
    }

    /// Whole bytes pulled from the input so far. After the final code this
    /// is the byte length of the payload, padding included.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// Extract the next `width` bits as a code. Running past the end of the
    /// buffer means a truncated or malformed stream and is fatal.
    pub fn read_code(&mut self, width: u32) -> Result<u16> {
        debug_assert!(width >= 1 && width <= 16);
        while self.nbits < width {
            if self.pos >= self.data.len() {
                return Err(AssetError::TruncatedBitstream);
            }
            self.acc |= (self.data[self.pos] as u32) << self.nbits;
            self.pos += 1;
            self.nbits += 8;
        }
        let code = (self.acc & ((1u32 << width) - 1)) as u16;
        self.acc >>= width;
        self.nbits -= width;
        Ok(code)
    }
}
