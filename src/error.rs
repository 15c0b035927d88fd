use thiserror::Error;

/// Errors raised by the PIC/CAT/PAN codecs.
///
/// Everything here is fatal for the asset being processed. Recoverable
/// anomalies (a skipped catalog entry, an unresolved jump label) are logged
/// through the `log` facade instead and never surface as an `Err`.
#[derive(Error, Debug)]
pub enum AssetError {
    /// An I/O error from a cursor read (always an out-of-bounds read, since
    /// the codecs only operate on in-memory buffers).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format flag was neither 0x07 (VGA) nor 0x0F (VGA + CGA map).
    #[error("unsupported image format flag 0x{0:04X}")]
    UnsupportedFormat(u16),

    /// The dictionary width byte is outside the 9..=11 bit code range the
    /// 2048-entry dictionary supports.
    #[error("dictionary width byte {0} outside the 9..=11 bit range")]
    BadDictionaryWidth(u8),

    /// The compressed bitstream ended in the middle of a code.
    #[error("compressed bitstream truncated")]
    TruncatedBitstream,

    /// A code referenced a dictionary slot past the 2048-entry bound.
    #[error("LZW code 0x{code:03X} exceeds the {limit}-entry dictionary")]
    DictionaryOverflow { code: u16, limit: usize },

    /// A code referenced a dictionary slot that has not been assigned yet.
    #[error("LZW code 0x{0:03X} not present in the dictionary")]
    InvalidCode(u16),

    /// An RLE repeat code appeared before any literal byte.
    #[error("RLE repeat code with no preceding byte")]
    RepeatWithoutPrevious,

    /// Decompression produced more packed bytes than the image dimensions
    /// allow.
    #[error("decompressed pixel data overruns the {expected}-byte target")]
    PixelOverrun { expected: usize },

    /// Decompression ran out of input before the pixel target was met.
    #[error("pixel data ends after {got} of {expected} packed bytes")]
    PixelUnderrun { expected: usize, got: usize },

    /// An odd width at the numeric limit cannot be rounded up for storage.
    #[error("image width {0} cannot be stored rounded up to even")]
    UnstorableWidth(u16),

    /// An embedded animation image failed to parse. Images carry no length
    /// field, so everything after the broken one is unreachable.
    #[error("embedded animation image {index} failed to parse: {source}")]
    AnimationImage { index: usize, source: Box<AssetError> },

    /// A pixel buffer did not match the width*height it was declared with.
    #[error("pixel buffer holds {got} entries, expected {expected}")]
    PixelCountMismatch { expected: usize, got: usize },

    /// A palette index was outside the 16-entry VGA table.
    #[error("palette index {0} outside the 16-colour VGA table")]
    BadPaletteIndex(u8),

    /// The animation file does not start with "PANI".
    #[error("bad animation magic {0:02X?}")]
    BadMagic([u8; 4]),

    /// The 5 reserved header bytes were not all zero.
    #[error("reserved animation header padding is not zero")]
    NonZeroPadding,

    /// The declared data section length does not match the remaining bytes.
    #[error("data section length mismatch: header declares {declared} bytes, file holds {actual}")]
    DataSectionMismatch { declared: usize, actual: usize },

    /// The data section does not open with the SceneStart opcode (0x05).
    #[error("data section starts with 0x{0:02X}, expected SceneStart (0x05)")]
    MissingSceneStart(u8),

    /// An opcode byte with no entry in the dispatch table.
    #[error("unknown opcode 0x{opcode:02X} at data offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    /// A multi-byte opcode whose continuation byte matches no candidate.
    #[error("contradictory opcode bytes {bytes:02X?} at data offset {offset}")]
    ContradictoryOpcode { bytes: Vec<u8>, offset: usize },

    /// A stack-consuming opcode without enough preceding PushToStack entries.
    #[error("{op} needs {needed} stack parameters, found {found}")]
    MissingStackParameters {
        op: &'static str,
        needed: usize,
        found: usize,
    },

    /// A jump label points into the middle of a folded push group.
    #[error("label at data offset {0} points inside a folded stack group")]
    LabelInsideFold(usize),

    /// A step type byte with no entry in the step table.
    #[error("unknown step type 0x{step:02X} at data offset {offset}")]
    UnknownStep { step: u8, offset: usize },

    /// A catalog directory entry points outside the file.
    #[error("catalog entry '{name}' points outside the file ({offset}+{length})")]
    CatalogEntryOutOfBounds {
        name: String,
        offset: usize,
        length: usize,
    },
}

pub type Result<T> = std::result::Result<T, AssetError>;
