//! facevm virtual machine: loads bytecode images and executes them.
//!
//! The machine keeps every active call on one stack. Each frame holds the
//! method's parameters and locals, a link to the caller's frame, and the
//! operand area above it.
//!
//! # Usage
//!
//! ```
//! use facevm_common::instruction::encode_all;
//! use facevm_common::{Instruction, Kind, MethodDescriptor, Opcode, Value};
//! use facevm_vm::{Image, Io, Machine, MachineConfig, State};
//!
//! let code = encode_all(&[
//!     Instruction::new(Opcode::Ipush, 42),
//!     Instruction::bare(Opcode::Iret),
//! ]);
//! let main = MethodDescriptor::new("main", Some(Kind::Integer), vec![], vec![], 0);
//! let bytes = facevm_common::Image::new(vec![Value::method(main)], code)
//!     .encode()
//!     .unwrap();
//!
//! let image = Image::from_bytes(bytes);
//! let mut machine = Machine::load(image, MachineConfig::default(), Io::null()).unwrap();
//! assert_eq!(machine.run().unwrap(), Some(Value::Integer(42)));
//! assert_eq!(machine.state(), State::Finished);
//! ```

pub mod error;
pub mod execute;
pub mod io;
pub mod loader;
pub mod machine;
pub mod pool;
pub mod stack;

pub use error::{LoadError, RuntimeError, VmError};
pub use io::{Io, SharedBuffer};
pub use loader::Image;
pub use machine::{Machine, MachineConfig, State};
pub use pool::ConstantPool;
pub use stack::{CallRecord, Frame, Slot};

use facevm_common::Value;

/// Load an in-memory image with the default configuration and run it.
///
/// # Errors
///
/// [`VmError::Load`] if the image cannot be materialized or has no
/// entry point, [`VmError::Runtime`] if execution faults.
pub fn run(bytes: &[u8], io: Io) -> Result<Option<Value>, VmError> {
    let mut machine = Machine::load(Image::from_bytes(bytes), MachineConfig::default(), io)?;
    Ok(machine.run()?)
}
