//! QB script record toolkit
//!
//! Parses, edits and re-serializes the `SectionScript` item of a QB container,
//! and renders its bytecode as readable pseudo-source.
//!
//! # Format Overview
//!
//! ## Script record
//!
//! Integers use the container's endianness:
//! - Generic item header (type tag, item key, file key)
//! - 4 bytes: Unknown field (opaque)
//! - 4 bytes: Decompressed size
//! - 4 bytes: Compressed size
//! - Compressed payload (raw when both sizes are equal)
//! - Zero padding to the next 4-byte boundary
//!
//! ## Payload
//!
//! The decompressed payload is a byte-oriented opcode stream. Operands are
//! little-endian; embedded struct blocks are always big-endian.

pub mod codec;
pub mod config;
pub mod decompile;
mod header;
pub mod hexdump;
mod item;
mod key;
pub mod names;
pub mod strings;

// Re-export main types
pub use codec::{Codec, Lzss};
pub use config::{Charset, ContainerConfig, Endian, Platform};
pub use decompile::decompile;
pub use header::{ItemHeader, ItemType};
pub use hexdump::hex_dump;
pub use item::{Item, ScriptItem};
pub use key::QbKey;
pub use names::{NameTable, Names};
pub use strings::ScriptString;

/// Size of the three fixed script fields following the item header
pub const SCRIPT_FIELDS_SIZE: usize = 12;

/// Records are padded to this boundary
pub const RECORD_ALIGNMENT: usize = 4;

/// Payload of a freshly created script: newline, endscript
pub const DEFAULT_PROGRAM: [u8; 2] = [0x01, 0x24];

/// Error category, mirroring how callers are expected to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed record bytes or a broken internal invariant; fatal
    Format,
    /// Malformed struct block; aborts decompilation only
    Decode,
    /// Rejected string edit; nothing was mutated
    Validation,
}

/// Errors from QB script handling
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Location 0x{offset:08X}: script decompressed to {actual} bytes not {expected}")]
    DecompressedLength {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Decompression size mismatch: expected {expected}, got {actual}")]
    DecompressionSize { expected: usize, actual: usize },

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Item type {0} is not a script item type")]
    NotScriptItem(ItemType),

    #[error("Unsupported item type {0}")]
    UnsupportedItemType(ItemType),

    #[error("Length check failed: predicted {predicted} bytes, wrote {written}")]
    LengthMismatch { predicted: usize, written: usize },

    #[error("Invalid qb struct at 0x{offset:04X}: expected 01 00, got {found:02X?}")]
    StructSentinel { offset: usize, found: Vec<u8> },

    #[error("String {index}: character {ch:?} is not allowed")]
    InvalidStringChar { index: usize, ch: char },

    #[error("String {index}: encodes to {actual} bytes, slot holds {expected}")]
    StringWidth {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("String {index}: slot 0x{pos:X}+{len} is outside the {payload_len} byte payload")]
    StringOutOfBounds {
        index: usize,
        pos: usize,
        len: usize,
        payload_len: usize,
    },
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::StructSentinel { .. } => ErrorKind::Decode,
            Error::InvalidStringChar { .. }
            | Error::StringWidth { .. }
            | Error::StringOutOfBounds { .. } => ErrorKind::Validation,
            _ => ErrorKind::Format,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
