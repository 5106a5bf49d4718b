use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors for a single record decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("short read: expected {expected} bytes, only {available} available")]
    ShortRead { expected: usize, available: usize },

    #[error("record signature is not 'FILE', found: {}", String::from_utf8_lossy(.found))]
    BadSignature { found: [u8; 4] },

    #[error("attribute chain truncated at offset {offset:#x} (limit {limit:#x})")]
    Truncated { offset: usize, limit: usize },

    #[error("invalid data run at byte {position}: {reason}")]
    InvalidRun { position: usize, reason: String },

    #[error("runlist exceeded {limit} runs without a terminator")]
    RunlistOverrun { limit: usize },

    #[error("invalid integer length: {0} (expected 1..=8 bytes)")]
    InvalidLength(usize),

    #[error("cannot decode an empty byte span")]
    EmptyInput,

    #[error("unknown attribute type: {0:#x}")]
    UnknownAttributeType(u32),

    #[error("invalid volume parameters: {0}")]
    InvalidParameters(String),

    #[error("MFT entry {0} is not mapped by the $MFT run-list")]
    EntryOutOfRange(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal integrity findings attached to a decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum DecodeWarning {
    /// The last two bytes of a sector do not hold the update sequence number.
    FixupMismatch {
        sector: usize,
        expected: [u8; 2],
        found: [u8; 2],
    },
    /// The update sequence array or one of its sectors lies outside the record.
    FixupOutOfBounds { fixup_offset: u16, entry_count: u16 },
    UnknownAttributeType { type_id: u32, offset: usize },
    /// A $STANDARD_INFORMATION / $FILE_NAME value too short to decode.
    MalformedContent { type_id: u32, offset: usize },
    AllocatedSizeMismatch { header: u32, actual: usize },
}
