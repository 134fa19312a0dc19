//! Instruction encoding and decoding.
//!
//! Instructions are variable length, little-endian:
//! ```text
//! Byte 0:    opcode (u8)
//! Bytes 1-4: operand (i32), present only if the opcode takes one
//! ```

use crate::cursor::ByteCursor;
use crate::error::ImageError;
use crate::opcode::Opcode;

/// Size of the operand that follows operand-taking opcodes.
pub const OPERAND_SIZE: usize = 4;

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Operand; always 0 for opcodes that take none.
    pub operand: i32,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: i32) -> Self {
        let operand = if opcode.has_operand() { operand } else { 0 };
        Self { opcode, operand }
    }

    /// An instruction for an opcode without operand.
    pub fn bare(opcode: Opcode) -> Self {
        Self::new(opcode, 0)
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        if self.opcode.has_operand() {
            1 + OPERAND_SIZE
        } else {
            1
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        if self.opcode.has_operand() {
            out.extend_from_slice(&self.operand.to_le_bytes());
        }
    }

    /// Decode one instruction at the cursor.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, ImageError> {
        let offset = cursor.position();
        let byte = cursor.read_u8()?;
        let opcode = Opcode::try_from(byte)
            .map_err(|opcode| ImageError::UnknownOpcode { offset, opcode })?;
        let operand = if opcode.has_operand() {
            cursor.read_i32()?
        } else {
            0
        };
        Ok(Self { opcode, operand })
    }
}

/// Encode a sequence of instructions into an instruction stream.
pub fn encode_all(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(instructions.iter().map(|i| i.encoded_len()).sum());
    for instr in instructions {
        instr.encode_into(&mut out);
    }
    out
}

/// Decode a whole instruction stream, pairing each instruction with its offset.
pub fn decode_all(code: &[u8]) -> Result<Vec<(usize, Instruction)>, ImageError> {
    let mut cursor = ByteCursor::new(code);
    let mut out = Vec::new();
    while !cursor.is_at_end() {
        let offset = cursor.position();
        out.push((offset, Instruction::decode(&mut cursor)?));
    }
    Ok(out)
}
