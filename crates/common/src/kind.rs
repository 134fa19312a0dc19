//! Kind tags for the facevm value model.
//!
//! The byte values double as the type tags written into images.

use std::fmt;

/// Identifies the kind of a value, constant, local or parameter.
///
/// Every value has exactly one kind. Kinds are compared, never converted:
/// an `Integer` is never read as a `Byte`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Signed 8-bit integer.
    Byte = 0x01,
    /// Signed 32-bit integer.
    Integer = 0x02,
    /// IEEE 754 32-bit float. Reserved, no opcodes.
    Float = 0x03,
    /// Signed 64-bit integer. Reserved, no opcodes.
    Long = 0x04,
    /// IEEE 754 64-bit float. Reserved, no opcodes.
    Double = 0x05,
    /// Immutable UTF-8 string.
    String = 0x06,
    /// Offset into the (unused) heap region.
    Reference = 0x07,
    /// Callable method descriptor.
    Method = 0x08,
}

/// Tag byte used in a method's return-type slot for "returns nothing".
pub const VOID_TAG: u8 = 0x00;

/// All kinds, in tag order.
pub const ALL_KINDS: [Kind; 8] = [
    Kind::Byte,
    Kind::Integer,
    Kind::Float,
    Kind::Long,
    Kind::Double,
    Kind::String,
    Kind::Reference,
    Kind::Method,
];

impl TryFrom<u8> for Kind {
    type Error = u8;

    /// Returns the offending byte on failure; callers attach the offset.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Kind::Byte),
            0x02 => Ok(Kind::Integer),
            0x03 => Ok(Kind::Float),
            0x04 => Ok(Kind::Long),
            0x05 => Ok(Kind::Double),
            0x06 => Ok(Kind::String),
            0x07 => Ok(Kind::Reference),
            0x08 => Ok(Kind::Method),
            other => Err(other),
        }
    }
}

impl Kind {
    /// Stable display name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Byte => "byte",
            Kind::Integer => "int",
            Kind::Float => "float",
            Kind::Long => "long",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Reference => "ref",
            Kind::Method => "method",
        }
    }

    /// Single-letter form used by the assembly text format.
    pub fn letter(&self) -> char {
        match self {
            Kind::Byte => 'B',
            Kind::Integer => 'I',
            Kind::Float => 'F',
            Kind::Long => 'L',
            Kind::Double => 'D',
            Kind::String => 'S',
            Kind::Reference => 'R',
            Kind::Method => 'M',
        }
    }

    /// Inverse of [`Kind::letter`].
    pub fn from_letter(letter: char) -> Option<Kind> {
        ALL_KINDS.iter().copied().find(|k| k.letter() == letter)
    }

    /// True for kinds whose constants can appear in an image today.
    pub fn has_constant_encoding(&self) -> bool {
        matches!(
            self,
            Kind::Byte | Kind::Integer | Kind::String | Kind::Method
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
