//! Method descriptors: the callable entries of a constant pool.

use crate::kind::Kind;

/// Metadata for one method in the constant pool.
///
/// Descriptors are immutable once loaded. Per-call state such as the
/// return address lives on the VM's call records, never here, so the
/// same method can be active several times in one call chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Method name, matched against the entry-point name at load time.
    pub name: String,
    /// Declared return kind, `None` for void.
    pub return_type: Option<Kind>,
    /// Declared parameter kinds, in push order.
    pub params: Vec<Kind>,
    /// Declared kinds of the locals that follow the parameters.
    pub locals: Vec<Kind>,
    /// Byte offset of the body, relative to the start of the instruction stream.
    pub body_offset: u32,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        return_type: Option<Kind>,
        params: Vec<Kind>,
        locals: Vec<Kind>,
        body_offset: u32,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
            locals,
            body_offset,
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Slots below the link slot: parameters followed by locals.
    pub fn frame_width(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    /// Declared kind of local slot `index` (parameters come first).
    pub fn slot_kind(&self, index: usize) -> Option<Kind> {
        self.params
            .iter()
            .chain(self.locals.iter())
            .nth(index)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_kinds_list_params_then_locals() {
        let m = MethodDescriptor::new(
            "f",
            Some(Kind::Integer),
            vec![Kind::Integer, Kind::String],
            vec![Kind::Byte],
            0,
        );
        assert_eq!(m.frame_width(), 3);
        assert_eq!(m.slot_kind(0), Some(Kind::Integer));
        assert_eq!(m.slot_kind(1), Some(Kind::String));
        assert_eq!(m.slot_kind(2), Some(Kind::Byte));
        assert_eq!(m.slot_kind(3), None);
    }
}
