//! The two-stage compression pipeline shared by every pixel payload:
//! run-length coding of the packed pixel pairs, then LZW over the RLE
//! output.

pub mod bitstream;
pub mod lzw;
pub mod rle;

use crate::error::{AssetError, Result};

/// Compress a packed pixel-pair buffer into an image payload.
pub fn compress_payload(packed: &[u8], max_width: u32) -> Vec<u8> {
    lzw::compress(&rle::encode(packed), max_width)
}

/// Decompress an image payload back into packed pixel pairs.
///
/// The payload has no length field of its own, so decoding is driven by
/// `target`, the packed byte count implied by the image dimensions. Words
/// are pulled from the LZW stream until the target is met; the returned
/// count is how many payload bytes that took, which is what lets the
/// caller skip past an embedded image.
pub fn decompress_payload(
    data: &[u8],
    target: usize,
    max_width: u32,
) -> Result<(Vec<u8>, usize)> {
    let mut lzw = lzw::Decompressor::new(data, max_width);
    let mut rle = rle::RleDecoder::new();
    let mut word = Vec::new();

    while rle.len() < target {
        word.clear();
        if !lzw.next_word(&mut word)? {
            return Err(AssetError::PixelUnderrun {
                expected: target,
                got: rle.len(),
            });
        }
        for &byte in &word {
            rle.push(byte)?;
        }
    }

    let consumed = lzw.bytes_consumed();
    let packed = rle.into_inner();
    if packed.len() > target {
        return Err(AssetError::PixelOverrun { expected: target });
    }
    Ok((packed, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips() {
        let packed: Vec<u8> = (0..200u16).map(|i| (i % 23) as u8).collect();
        let payload = compress_payload(&packed, 11);
        let (decoded, consumed) = decompress_payload(&payload, packed.len(), 11).unwrap();
        assert_eq!(decoded, packed);
        assert_eq!(consumed, payload.len());
    }

    #[test]
    fn consumed_count_ignores_trailing_data() {
        let packed = vec![0x12; 64];
        let payload = compress_payload(&packed, 11);
        let mut buffer = payload.clone();
        buffer.extend_from_slice(&[0xFF; 8]);
        let (decoded, consumed) = decompress_payload(&buffer, packed.len(), 11).unwrap();
        assert_eq!(decoded, packed);
        assert_eq!(consumed, payload.len());
    }

    #[test]
    fn short_payload_is_an_underrun() {
        let packed = vec![0x34; 16];
        let payload = compress_payload(&packed, 11);
        let err = decompress_payload(&payload, 32, 11).unwrap_err();
        assert!(matches!(
            err,
            AssetError::PixelUnderrun {
                expected: 32,
                got: 16
            }
        ));
    }

    #[test]
    fn run_crossing_the_target_is_an_overrun() {
        // The final RLE code expands past the target inside one word.
        let mut packed: Vec<u8> = (1..=9).collect();
        packed.extend_from_slice(&[0x20; 5]);
        let payload = compress_payload(&packed, 11);
        let err = decompress_payload(&payload, 11, 11).unwrap_err();
        assert!(matches!(err, AssetError::PixelOverrun { expected: 11 }));
    }
}
