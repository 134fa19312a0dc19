//! Image header encoding and decoding.
//!
//! A facevm image is laid out as:
//! ```text
//! [u32 magic, LE][u8 constant count N][N constants][instruction stream]
//! ```
//! Each constant is a kind tag byte followed by a kind-specific payload:
//! - Byte: 1 byte
//! - Integer: 4 bytes, LE
//! - String: NUL-terminated UTF-8
//! - Method: NUL-terminated name, return tag (0 = void), local count +
//!   local tags, param count + param tags, u32 LE body offset
//!
//! Body offsets are relative to the start of the instruction stream.
//! Float, Long, Double and Reference constants have no encoding.

use std::rc::Rc;

use crate::cursor::ByteCursor;
use crate::error::ImageError;
use crate::instruction::{decode_all, Instruction};
use crate::kind::{Kind, VOID_TAG};
use crate::method::MethodDescriptor;
use crate::value::Value;

/// Magic number every image starts with.
pub const MAGIC: u32 = 0xBABE_FACE;

/// Largest constant pool a one-byte count can describe.
pub const MAX_CONSTANTS: usize = u8::MAX as usize;

/// The decoded header of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Constant pool, in image order.
    pub constants: Vec<Value>,
    /// Offset of the first instruction byte within the image.
    pub code_start: usize,
}

/// Decode the header of an image, leaving the instruction stream untouched.
pub fn decode_header(bytes: &[u8]) -> Result<Header, ImageError> {
    let mut cursor = ByteCursor::new(bytes);

    let found = cursor.read_u32()?;
    if found != MAGIC {
        return Err(ImageError::BadMagic {
            expected: MAGIC,
            found,
        });
    }

    let count = cursor.read_u8()? as usize;
    let mut constants = Vec::with_capacity(count);
    for index in 0..count {
        constants.push(read_constant(&mut cursor, index)?);
    }

    Ok(Header {
        constants,
        code_start: cursor.position(),
    })
}

fn read_constant(cursor: &mut ByteCursor<'_>, index: usize) -> Result<Value, ImageError> {
    let kind = read_kind(cursor)?;
    match kind {
        Kind::Byte => Ok(Value::Byte(cursor.read_u8()? as i8)),
        Kind::Integer => Ok(Value::Integer(cursor.read_i32()?)),
        Kind::String => Ok(Value::String(Rc::from(cursor.read_cstr()?))),
        Kind::Method => Ok(Value::Method(Rc::new(read_method(cursor)?))),
        Kind::Float | Kind::Long | Kind::Double | Kind::Reference => {
            Err(ImageError::UnsupportedKind { index, kind })
        }
    }
}

fn read_kind(cursor: &mut ByteCursor<'_>) -> Result<Kind, ImageError> {
    let offset = cursor.position();
    let tag = cursor.read_u8()?;
    Kind::try_from(tag).map_err(|tag| ImageError::UnknownKind { offset, tag })
}

fn read_kinds(cursor: &mut ByteCursor<'_>) -> Result<Vec<Kind>, ImageError> {
    let count = cursor.read_u8()? as usize;
    (0..count).map(|_| read_kind(cursor)).collect()
}

fn read_method(cursor: &mut ByteCursor<'_>) -> Result<MethodDescriptor, ImageError> {
    let name = cursor.read_cstr()?.to_string();

    let offset = cursor.position();
    let return_type = match cursor.read_u8()? {
        VOID_TAG => None,
        tag => Some(
            Kind::try_from(tag).map_err(|tag| ImageError::InvalidReturnType { offset, tag })?,
        ),
    };

    // Locals precede parameters in the image.
    let locals = read_kinds(cursor)?;
    let params = read_kinds(cursor)?;
    let body_offset = cursor.read_u32()?;

    Ok(MethodDescriptor {
        name,
        return_type,
        params,
        locals,
        body_offset,
    })
}

/// A complete image: constant pool plus instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub constants: Vec<Value>,
    pub code: Vec<u8>,
}

impl Image {
    pub fn new(constants: Vec<Value>, code: Vec<u8>) -> Self {
        Self { constants, code }
    }

    /// Decode header and instruction stream from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let header = decode_header(bytes)?;
        Ok(Self {
            constants: header.constants,
            code: bytes[header.code_start..].to_vec(),
        })
    }

    /// Decode the instruction stream, pairing each instruction with its offset.
    pub fn instructions(&self) -> Result<Vec<(usize, Instruction)>, ImageError> {
        decode_all(&self.code)
    }

    /// Encode to the binary image format.
    pub fn encode(&self) -> Result<Vec<u8>, ImageError> {
        if self.constants.len() > MAX_CONSTANTS {
            return Err(ImageError::TooManyConstants(self.constants.len()));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.push(self.constants.len() as u8);
        for (index, constant) in self.constants.iter().enumerate() {
            write_constant(&mut out, index, constant)?;
        }
        out.extend_from_slice(&self.code);
        Ok(out)
    }
}

fn write_cstr(out: &mut Vec<u8>, index: usize, s: &str) -> Result<(), ImageError> {
    if s.as_bytes().contains(&0) {
        return Err(ImageError::InteriorNul { index });
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

fn write_kinds(out: &mut Vec<u8>, method: &str, kinds: &[Kind]) -> Result<(), ImageError> {
    let count = u8::try_from(kinds.len()).map_err(|_| ImageError::TooManyTypes {
        method: method.to_string(),
        count: kinds.len(),
    })?;
    out.push(count);
    out.extend(kinds.iter().map(|&k| k as u8));
    Ok(())
}

fn write_constant(out: &mut Vec<u8>, index: usize, value: &Value) -> Result<(), ImageError> {
    let kind = value.kind();
    if !kind.has_constant_encoding() {
        return Err(ImageError::UnsupportedKind { index, kind });
    }
    out.push(kind as u8);
    match value {
        Value::Byte(n) => out.push(*n as u8),
        Value::Integer(n) => out.extend_from_slice(&n.to_le_bytes()),
        Value::String(s) => write_cstr(out, index, s)?,
        Value::Method(m) => {
            write_cstr(out, index, &m.name)?;
            out.push(m.return_type.map_or(VOID_TAG, |k| k as u8));
            write_kinds(out, &m.name, &m.locals)?;
            write_kinds(out, &m.name, &m.params)?;
            out.extend_from_slice(&m.body_offset.to_le_bytes());
        }
        Value::Float(_) | Value::Long(_) | Value::Double(_) | Value::Reference(_) => {
            return Err(ImageError::UnsupportedKind { index, kind });
        }
    }
    Ok(())
}
