//! facevm common types and image encoding.
//!
//! This crate provides the data structures shared by the machine, the
//! assembler and the CLI:
//!
//! - [`Kind`]: the eight value kinds and their image tags
//! - [`Value`]: tagged runtime values
//! - [`MethodDescriptor`]: method signatures stored in the constant pool
//! - [`Opcode`] and [`Instruction`]: the instruction set and its encoding
//! - [`Image`]: the binary image format (magic, constant pool, code)
//! - [`ImageError`]: everything that can go wrong reading or writing one

pub mod cursor;
pub mod error;
pub mod image;
pub mod instruction;
pub mod kind;
pub mod method;
pub mod opcode;
pub mod value;

pub use cursor::ByteCursor;
pub use error::ImageError;
pub use image::{decode_header, Header, Image, MAGIC};
pub use instruction::Instruction;
pub use kind::Kind;
pub use method::MethodDescriptor;
pub use opcode::Opcode;
pub use value::Value;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_opcode() -> impl Strategy<Value = Opcode> {
        prop::sample::select(&opcode::ALL_OPCODES[..])
    }

    fn arb_kind() -> impl Strategy<Value = Kind> {
        prop::sample::select(&kind::ALL_KINDS[..])
    }

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        (arb_opcode(), any::<i32>()).prop_map(|(op, operand)| Instruction::new(op, operand))
    }

    fn arb_method() -> impl Strategy<Value = Value> {
        (
            "[a-z_][a-z0-9_]{0,8}",
            prop::option::of(arb_kind()),
            prop::collection::vec(arb_kind(), 0..4),
            prop::collection::vec(arb_kind(), 0..4),
            any::<u32>(),
        )
            .prop_map(|(name, ret, params, locals, offset)| {
                Value::method(MethodDescriptor::new(&name, ret, params, locals, offset))
            })
    }

    fn arb_constant() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i8>().prop_map(Value::Byte),
            any::<i32>().prop_map(Value::Integer),
            "[a-zA-Z0-9 ,.!?]{0,16}".prop_map(|s| Value::string(&s)),
            arb_method(),
        ]
    }

    proptest! {
        #[test]
        fn instruction_stream_decodes_to_what_was_encoded(
            instrs in prop::collection::vec(arb_instruction(), 0..50)
        ) {
            let bytes = instruction::encode_all(&instrs);
            let decoded: Vec<Instruction> = instruction::decode_all(&bytes)
                .unwrap()
                .into_iter()
                .map(|(_, i)| i)
                .collect();
            prop_assert_eq!(instrs, decoded);
        }

        /// Images built from encodable constants decode back unchanged.
        #[test]
        fn image_decodes_to_what_was_encoded(
            constants in prop::collection::vec(arb_constant(), 0..20),
            instrs in prop::collection::vec(arb_instruction(), 0..20),
        ) {
            let image = Image::new(constants, instruction::encode_all(&instrs));
            let bytes = image.encode().unwrap();
            prop_assert_eq!(Image::decode(&bytes).unwrap(), image);
        }

        /// Arbitrary bytes after a valid magic never panic the header decoder.
        #[test]
        fn random_header_bytes_never_panic(
            tail in prop::collection::vec(any::<u8>(), 0..128)
        ) {
            let mut bytes = MAGIC.to_le_bytes().to_vec();
            bytes.extend_from_slice(&tail);
            let _ = decode_header(&bytes);
        }
    }
}
