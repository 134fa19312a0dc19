//! Errors for encoding and decoding facevm images.

use thiserror::Error;

use crate::kind::Kind;

/// Errors that occur while reading or writing the binary image format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// The first four bytes are not the image magic number.
    #[error("bad magic number: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    /// A read ran past the end of the image.
    #[error("truncated image: needed {needed} byte(s) at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A string has no NUL terminator before the end of the image.
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    /// A string's bytes are not valid UTF-8.
    #[error("string at offset {offset} is not valid utf-8")]
    InvalidUtf8 { offset: usize },

    /// A type tag byte does not name any kind.
    #[error("unknown type tag {tag:#04x} at offset {offset}")]
    UnknownKind { offset: usize, tag: u8 },

    /// A constant of a reserved kind that has no encoding yet.
    #[error("constant #{index} has unsupported kind {kind}")]
    UnsupportedKind { index: usize, kind: Kind },

    /// An instruction byte that is not a known opcode.
    #[error("unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    /// A string constant or method name contains a NUL byte and cannot be
    /// written as a NUL-terminated string.
    #[error("constant #{index} contains an interior NUL byte")]
    InteriorNul { index: usize },

    /// Return type byte is neither void nor a kind.
    #[error("invalid return type {tag:#04x} at offset {offset}")]
    InvalidReturnType { offset: usize, tag: u8 },

    /// More constants than the one-byte pool size can express.
    #[error("constant pool has {0} entries (at most 255 allowed)")]
    TooManyConstants(usize),

    /// A method signature list longer than its one-byte count.
    #[error("method '{method}' declares {count} types (at most 255 allowed)")]
    TooManyTypes { method: String, count: usize },
}
