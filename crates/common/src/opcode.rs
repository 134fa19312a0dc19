//! Opcode definitions for the facevm instruction set.

/// Number of distinct opcode bytes; the dispatch table has one slot each.
pub const NUM_OPCODES: usize = 256;

/// Identifies the operation to perform.
///
/// The `#[repr(u8)]` attribute gives each variant its stable byte value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Special operations
    /// No operation.
    Noop = 0x00,
    /// Suspend execution. Reserved; executes as a no-op.
    Halt = 0x01,
    /// Stop the machine, marking it finished.
    Stop = 0x02,
    /// Discard the top operand.
    Pop = 0x03,
    /// Call the method at constant pool index `operand`.
    Call = 0x04,
    /// Return to the caller without a value.
    Ret = 0x05,

    // Integer operations
    /// Push integer local `operand`.
    Iload = 0x10,
    /// Pop an integer into local `operand`.
    Istore = 0x11,
    /// Push the immediate integer `operand`.
    Ipush = 0x12,
    /// Pop two integers, push their sum.
    Iadd = 0x13,
    /// Pop two integers, push (second_popped - first_popped).
    Isub = 0x14,
    /// Pop two integers, push their product.
    Imult = 0x15,
    /// Pop two integers, push the quotient. Division by zero is an error.
    Idiv = 0x16,
    /// Negate the integer on top of the operand stack in place.
    Ineg = 0x17,
    /// Pop an integer and print it.
    Iprint = 0x18,
    /// Return the integer on top of the operand stack.
    Iret = 0x19,
    /// Push integer constant `operand`.
    Iconst = 0x1A,

    // String operations
    /// Push string local `operand`.
    Sload = 0x30,
    /// Pop a string into local `operand`.
    Sstore = 0x31,
    /// Pop a string and print it.
    Sprint = 0x32,
    /// Return the string on top of the operand stack.
    Sret = 0x33,
    /// Push string constant `operand`.
    Sconst = 0x34,

    // Constant pool operations
    /// Push constant `operand`, whatever its kind (methods excepted).
    Cload = 0x50,
}

/// All valid opcodes, in byte order.
pub const ALL_OPCODES: [Opcode; 23] = [
    Opcode::Noop,
    Opcode::Halt,
    Opcode::Stop,
    Opcode::Pop,
    Opcode::Call,
    Opcode::Ret,
    Opcode::Iload,
    Opcode::Istore,
    Opcode::Ipush,
    Opcode::Iadd,
    Opcode::Isub,
    Opcode::Imult,
    Opcode::Idiv,
    Opcode::Ineg,
    Opcode::Iprint,
    Opcode::Iret,
    Opcode::Iconst,
    Opcode::Sload,
    Opcode::Sstore,
    Opcode::Sprint,
    Opcode::Sret,
    Opcode::Sconst,
    Opcode::Cload,
];

impl TryFrom<u8> for Opcode {
    type Error = u8;

    /// Returns the offending byte for anything outside the instruction set.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Opcode::Noop),
            0x01 => Ok(Opcode::Halt),
            0x02 => Ok(Opcode::Stop),
            0x03 => Ok(Opcode::Pop),
            0x04 => Ok(Opcode::Call),
            0x05 => Ok(Opcode::Ret),

            0x10 => Ok(Opcode::Iload),
            0x11 => Ok(Opcode::Istore),
            0x12 => Ok(Opcode::Ipush),
            0x13 => Ok(Opcode::Iadd),
            0x14 => Ok(Opcode::Isub),
            0x15 => Ok(Opcode::Imult),
            0x16 => Ok(Opcode::Idiv),
            0x17 => Ok(Opcode::Ineg),
            0x18 => Ok(Opcode::Iprint),
            0x19 => Ok(Opcode::Iret),
            0x1A => Ok(Opcode::Iconst),

            0x30 => Ok(Opcode::Sload),
            0x31 => Ok(Opcode::Sstore),
            0x32 => Ok(Opcode::Sprint),
            0x33 => Ok(Opcode::Sret),
            0x34 => Ok(Opcode::Sconst),

            0x50 => Ok(Opcode::Cload),

            other => Err(other),
        }
    }
}

impl Opcode {
    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Noop => "noop",
            Opcode::Halt => "halt",
            Opcode::Stop => "stop",
            Opcode::Pop => "pop",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Iload => "iload",
            Opcode::Istore => "istore",
            Opcode::Ipush => "ipush",
            Opcode::Iadd => "iadd",
            Opcode::Isub => "isub",
            Opcode::Imult => "imult",
            Opcode::Idiv => "idiv",
            Opcode::Ineg => "ineg",
            Opcode::Iprint => "iprint",
            Opcode::Iret => "iret",
            Opcode::Iconst => "iconst",
            Opcode::Sload => "sload",
            Opcode::Sstore => "sstore",
            Opcode::Sprint => "sprint",
            Opcode::Sret => "sret",
            Opcode::Sconst => "sconst",
            Opcode::Cload => "cload",
        }
    }

    /// Looks up an opcode by mnemonic, ignoring ASCII case.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// True if the opcode is followed by a 4-byte integer operand.
    pub fn has_operand(&self) -> bool {
        matches!(
            self,
            Opcode::Halt
                | Opcode::Call
                | Opcode::Iload
                | Opcode::Istore
                | Opcode::Ipush
                | Opcode::Iconst
                | Opcode::Sload
                | Opcode::Sstore
                | Opcode::Sconst
                | Opcode::Cload
        )
    }

    /// True if the operand is an index into the constant pool.
    pub fn takes_constant_index(&self) -> bool {
        matches!(
            self,
            Opcode::Call | Opcode::Iconst | Opcode::Sconst | Opcode::Cload
        )
    }
}
