//! Load-time and run-time errors for the facevm machine.
//!
//! Load errors abort construction: no machine exists afterwards. Run-time
//! errors carry the byte offset (`at`) of the failing instruction and the
//! mnemonic of the operation that raised them.

use facevm_common::{ImageError, Kind};
use thiserror::Error;

use crate::machine::State;

/// Errors raised while building a machine from an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The image file is missing, unreadable or empty.
    #[error("cannot read image '{path}': {reason}")]
    ImageUnreadable { path: String, reason: String },

    #[error("bad magic number: expected {expected:#010x}, found {found:#010x}")]
    BadMagicNumber { expected: u32, found: u32 },

    /// A constant of a reserved kind that has no encoding.
    #[error("constant #{index} has unsupported type {kind}")]
    UnsupportedConstantType { index: usize, kind: Kind },

    #[error("unknown type tag {tag:#04x} at offset {offset}")]
    UnknownConstantTag { offset: usize, tag: u8 },

    /// Any other structural problem with the image.
    #[error("malformed image: {0}")]
    Malformed(ImageError),

    /// A parameter or local declared with the method kind.
    #[error("method '{method}' declares slot {index} with kind method")]
    InvalidSignature { method: String, index: usize },

    #[error("method '{method}' body offset {offset} is outside the code ({code_len} bytes)")]
    BodyOutOfRange {
        method: String,
        offset: u32,
        code_len: usize,
    },

    #[error("no entry point: no method named '{name}'")]
    NoEntryPoint { name: String },

    /// The implicit call into the entry method failed.
    #[error("entry call failed: {0}")]
    EntryCallFailed(RuntimeError),
}

impl From<ImageError> for LoadError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::BadMagic { expected, found } => {
                LoadError::BadMagicNumber { expected, found }
            }
            ImageError::UnsupportedKind { index, kind } => {
                LoadError::UnsupportedConstantType { index, kind }
            }
            ImageError::UnknownKind { offset, tag } => {
                LoadError::UnknownConstantTag { offset, tag }
            }
            other => LoadError::Malformed(other),
        }
    }
}

/// Errors that fault a running machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// An argument on the caller's operand stack does not match the
    /// callee's declared parameter kind.
    #[error("{op}: argument {index} of '{method}' expected {expected}, found {found} at offset {at}")]
    ArgumentTypeMismatch {
        at: usize,
        op: &'static str,
        method: String,
        index: usize,
        expected: Kind,
        found: Kind,
    },

    #[error("{op}: operand stack underflow at offset {at}")]
    OperandStackUnderflow { at: usize, op: &'static str },

    #[error("{op}: expected {expected} operand, found {found} at offset {at}")]
    OperandTypeMismatch {
        at: usize,
        op: &'static str,
        expected: Kind,
        found: Kind,
    },

    #[error("{op}: local {index} is {found}, expected {expected} at offset {at}")]
    LocalTypeMismatch {
        at: usize,
        op: &'static str,
        index: usize,
        expected: Kind,
        found: Kind,
    },

    #[error("{op}: local index {index} out of bounds ({count} slots) at offset {at}")]
    LocalIndexOutOfBounds {
        at: usize,
        op: &'static str,
        index: i32,
        count: usize,
    },

    #[error("{op}: constant index {index} out of bounds (pool size {size}) at offset {at}")]
    ConstantIndexOutOfBounds {
        at: usize,
        op: &'static str,
        index: i32,
        size: usize,
    },

    /// `expected` names a kind, or "non-method" for `cload`.
    #[error("{op}: constant #{index} is {found}, expected {expected} at offset {at}")]
    ConstantTypeMismatch {
        at: usize,
        op: &'static str,
        index: usize,
        expected: &'static str,
        found: Kind,
    },

    /// A return that does not match the active method's declared return
    /// type. `expected` and `found` name a kind, or "void".
    #[error("{op}: method '{method}' returns {expected}, found {found} at offset {at}")]
    ReturnTypeMismatch {
        at: usize,
        op: &'static str,
        method: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{op}: division by zero at offset {at}")]
    DivisionByZero { at: usize, op: &'static str },

    #[error("unknown opcode {opcode:#04x} at offset {at}")]
    UnknownOpcode { at: usize, opcode: u8 },

    /// The instruction pointer ran off the end of the code, or an operand
    /// was cut short.
    #[error("unexpected end of code at offset {at}")]
    UnexpectedEndOfCode { at: usize },

    #[error("{op}: stack overflow (capacity {capacity} slots) at offset {at}")]
    StackOverflow {
        at: usize,
        op: &'static str,
        capacity: usize,
    },

    /// A slot that should hold a frame link or a value holds something else.
    #[error("{op}: corrupt frame at offset {at}")]
    CorruptFrame { at: usize, op: &'static str },

    #[error("{op}: output failed at offset {at}: {reason}")]
    Output {
        at: usize,
        op: &'static str,
        reason: String,
    },

    #[error("machine is not ready to run (state: {state})")]
    NotReady { state: State },
}

/// Either kind of failure, for callers that load and run in one step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
