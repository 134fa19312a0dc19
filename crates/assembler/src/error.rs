//! Error types for the facevm assembler.

use facevm_common::Kind;
use thiserror::Error;

/// Errors produced while assembling text into an image.
///
/// Every variant carries the 1-based line it was found on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// A kind letter (or `V`) that names no kind.
    #[error("line {line}: unknown type '{token}'")]
    UnknownType { line: usize, token: String },

    #[error("line {line}: {what} expects {expected} argument(s)")]
    MissingArgument {
        line: usize,
        what: &'static str,
        expected: usize,
    },

    /// A numeric literal could not be parsed or is out of range.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    /// A locals or params signature whose count does not match its letters.
    #[error("line {line}: bad signature '{token}'")]
    BadSignature { line: usize, token: String },

    #[error("line {line}: expected 'const <count>' header")]
    MissingHeader { line: usize },

    #[error("line {line}: header declares {expected} constant(s), found {found}")]
    ConstantCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A label that names no method constant.
    #[error("line {line}: label '{name}' does not name a method")]
    UnknownLabel { line: usize, name: String },

    #[error("line {line}: method '{name}' already has a body")]
    DuplicateLabel { line: usize, name: String },

    #[error("line {line}: method '{name}' has no body")]
    MethodWithoutBody { line: usize, name: String },

    /// `call <name>` where no method constant has that name.
    #[error("line {line}: no method named '{name}'")]
    UnresolvedMethod { line: usize, name: String },

    /// Float, long, double and reference constants have no encoding.
    #[error("line {line}: {kind} constants are not supported")]
    UnsupportedConstant { line: usize, kind: Kind },

    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("line {line}: invalid escape '\\{escape}'")]
    InvalidEscape { line: usize, escape: char },
}
