//! Constant pool materializer.
//!
//! Parses the image header into typed constants, validates method
//! signatures against the instruction stream and locates the entry
//! method.

use std::rc::Rc;

use facevm_common::{decode_header, Kind, MethodDescriptor, Value};
use tracing::debug;

use crate::error::LoadError;

/// The materialized, immutable constant table of a loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Value>,
}

impl ConstantPool {
    /// Parse the header of `bytes` into a pool.
    ///
    /// Returns the pool and the offset at which the instruction stream
    /// starts. Every method descriptor is checked: no method-kind slots,
    /// and a body offset inside the code.
    pub fn materialize(bytes: &[u8]) -> Result<(Self, usize), LoadError> {
        let header = decode_header(bytes)?;
        let code_len = bytes.len() - header.code_start;

        for (index, constant) in header.constants.iter().enumerate() {
            debug!(index, constant = %constant, "constant materialized");
            if let Value::Method(method) = constant {
                validate_signature(method, code_len)?;
            }
        }
        debug!(
            constants = header.constants.len(),
            code_start = header.code_start,
            code_len,
            "constant pool materialized"
        );

        Ok((
            Self {
                entries: header.constants,
            },
            header.code_start,
        ))
    }

    pub fn from_values(entries: Vec<Value>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.entries.get(index)
    }

    /// The method descriptor at `index`, if that constant is a method.
    pub fn method(&self, index: usize) -> Option<&Rc<MethodDescriptor>> {
        self.get(index).and_then(Value::as_method)
    }

    /// The first method constant called `name`, with its index.
    pub fn find_method(&self, name: &str) -> Option<(usize, &Rc<MethodDescriptor>)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(i, v)| v.as_method().filter(|m| m.name == name).map(|m| (i, m)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }
}

fn validate_signature(method: &MethodDescriptor, code_len: usize) -> Result<(), LoadError> {
    let bad_slot =
        (0..method.frame_width()).find(|&i| method.slot_kind(i) == Some(Kind::Method));
    if let Some(index) = bad_slot {
        return Err(LoadError::InvalidSignature {
            method: method.name.clone(),
            index,
        });
    }

    if method.body_offset as usize >= code_len {
        return Err(LoadError::BodyOutOfRange {
            method: method.name.clone(),
            offset: method.body_offset,
            code_len,
        });
    }
    Ok(())
}
