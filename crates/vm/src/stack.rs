//! Execution stack and calling convention.
//!
//! One buffer holds every active call. A frame is laid out as
//! ```text
//!   lap            sp     sp+1           osp
//!   | params | locals | link | operands... |
//! ```
//! where `link` saves the caller's `sp`. Arguments pushed by the caller
//! become the callee's parameters in place, so a call copies nothing.

use facevm_common::{Kind, MethodDescriptor, Value};

use crate::error::RuntimeError;
use crate::pool::ConstantPool;

/// One slot of the execution stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Vacant,
    Value(Value),
    /// Saved `sp` of the caller. Never visible as user data.
    Link(usize),
}

/// Cursors of the active frame plus the instruction pointer.
///
/// Handlers work on a copy; the dispatch loop commits it on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    /// Byte offset of the next instruction.
    pub ip: usize,
    /// Base of the locals (first parameter).
    pub lap: usize,
    /// Link slot, directly above the locals.
    pub sp: usize,
    /// One past the top operand.
    pub osp: usize,
}

/// Activation record of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    /// Constant pool index of the called method.
    pub method: usize,
    /// Where the caller resumes.
    pub return_ip: usize,
}

/// Outcome of closing a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Return {
    /// Control is back in the caller.
    Resumed,
    /// The outermost call returned, with its value if any.
    Finished(Option<Value>),
}

#[derive(Debug, Clone)]
pub struct ExecStack {
    slots: Vec<Slot>,
    capacity: usize,
    records: Vec<CallRecord>,
}

impl ExecStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            records: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn depth(&self) -> usize {
        self.records.len()
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    fn put(&mut self, index: usize, slot: Slot) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, Slot::Vacant);
        }
        self.slots[index] = slot;
    }

    /// First slot of the operand area. Before the first call the whole
    /// buffer is operand area.
    fn operand_base(&self, f: &Frame) -> usize {
        if self.records.is_empty() {
            0
        } else {
            f.sp + 1
        }
    }

    pub fn operand_depth(&self, f: &Frame) -> usize {
        f.osp.saturating_sub(self.operand_base(f))
    }

    /// Operands of the frame, bottom to top.
    pub fn operands(&self, f: &Frame) -> impl Iterator<Item = &Value> {
        let base = self.operand_base(f).min(self.slots.len());
        let top = f.osp.min(self.slots.len());
        self.slots[base..top.max(base)].iter().filter_map(|s| match s {
            Slot::Value(v) => Some(v),
            _ => None,
        })
    }

    /// The operand `depth` places below the top (0 is the top).
    pub fn peek(
        &self,
        f: &Frame,
        depth: usize,
        at: usize,
        op: &'static str,
    ) -> Result<&Value, RuntimeError> {
        if depth >= self.operand_depth(f) {
            return Err(RuntimeError::OperandStackUnderflow { at, op });
        }
        match self.slots.get(f.osp - 1 - depth) {
            Some(Slot::Value(v)) => Ok(v),
            _ => Err(RuntimeError::CorruptFrame { at, op }),
        }
    }

    /// The top operand, which must be of `kind`.
    pub fn peek_kind(
        &self,
        f: &Frame,
        depth: usize,
        kind: Kind,
        at: usize,
        op: &'static str,
    ) -> Result<&Value, RuntimeError> {
        let value = self.peek(f, depth, at, op)?;
        if value.kind() != kind {
            return Err(RuntimeError::OperandTypeMismatch {
                at,
                op,
                expected: kind,
                found: value.kind(),
            });
        }
        Ok(value)
    }

    pub fn push(
        &mut self,
        f: &mut Frame,
        value: Value,
        at: usize,
        op: &'static str,
    ) -> Result<(), RuntimeError> {
        if f.osp >= self.capacity {
            return Err(RuntimeError::StackOverflow {
                at,
                op,
                capacity: self.capacity,
            });
        }
        self.put(f.osp, Slot::Value(value));
        f.osp += 1;
        Ok(())
    }

    /// Remove the top operand. An empty operand area is an error and
    /// leaves the stack unchanged.
    pub fn pop(&mut self, f: &mut Frame, at: usize, op: &'static str) -> Result<Value, RuntimeError> {
        self.peek(f, 0, at, op)?;
        match std::mem::take(&mut self.slots[f.osp - 1]) {
            Slot::Value(v) => {
                f.osp -= 1;
                Ok(v)
            }
            other => {
                self.slots[f.osp - 1] = other;
                Err(RuntimeError::CorruptFrame { at, op })
            }
        }
    }

    /// Replace the top operand in place.
    pub fn replace_top(&mut self, f: &Frame, value: Value, at: usize, op: &'static str) -> Result<(), RuntimeError> {
        self.peek(f, 0, at, op)?;
        self.slots[f.osp - 1] = Slot::Value(value);
        Ok(())
    }

    /// Absolute slot of local `index`, which must lie in `[lap, sp)`.
    pub fn local_slot(
        &self,
        f: &Frame,
        index: i32,
        at: usize,
        op: &'static str,
    ) -> Result<usize, RuntimeError> {
        let count = f.sp - f.lap;
        match usize::try_from(index) {
            Ok(i) if i < count && !self.records.is_empty() => Ok(f.lap + i),
            _ => Err(RuntimeError::LocalIndexOutOfBounds {
                at,
                op,
                index,
                count,
            }),
        }
    }

    /// Local `index`, which must hold a value of `kind`.
    pub fn local(
        &self,
        f: &Frame,
        index: i32,
        kind: Kind,
        at: usize,
        op: &'static str,
    ) -> Result<&Value, RuntimeError> {
        let slot = self.local_slot(f, index, at, op)?;
        match self.slots.get(slot) {
            Some(Slot::Value(v)) if v.kind() == kind => Ok(v),
            Some(Slot::Value(v)) => Err(RuntimeError::LocalTypeMismatch {
                at,
                op,
                index: slot - f.lap,
                expected: kind,
                found: v.kind(),
            }),
            _ => Err(RuntimeError::CorruptFrame { at, op }),
        }
    }

    /// Pop the top operand into local `index`. Both must be of `kind`;
    /// nothing changes unless both checks pass.
    pub fn store_local(
        &mut self,
        f: &mut Frame,
        index: i32,
        kind: Kind,
        at: usize,
        op: &'static str,
    ) -> Result<(), RuntimeError> {
        self.peek_kind(f, 0, kind, at, op)?;
        let slot = self.local_slot(f, index, at, op)?;
        self.local(f, index, kind, at, op)?;
        let value = self.pop(f, at, op)?;
        self.slots[slot] = Slot::Value(value);
        Ok(())
    }

    /// Open a frame for `method` (pool index `index`) over the top
    /// `P` operands, which become its parameters.
    ///
    /// Every check happens before anything is written. On success the
    /// frame's cursors describe the callee and `ip` is its body.
    pub fn open_frame(
        &mut self,
        f: &mut Frame,
        index: usize,
        method: &MethodDescriptor,
        at: usize,
        op: &'static str,
    ) -> Result<(), RuntimeError> {
        let params = method.param_count();
        let locals = method.local_count();

        if self.operand_depth(f) < params {
            return Err(RuntimeError::OperandStackUnderflow { at, op });
        }
        let sp = f.osp + locals;
        if sp + 1 > self.capacity {
            return Err(RuntimeError::StackOverflow {
                at,
                op,
                capacity: self.capacity,
            });
        }

        let lap = f.osp - params;
        for (i, &expected) in method.params.iter().enumerate() {
            match self.slots.get(lap + i) {
                Some(Slot::Value(v)) if v.kind() == expected => {}
                Some(Slot::Value(v)) => {
                    return Err(RuntimeError::ArgumentTypeMismatch {
                        at,
                        op,
                        method: method.name.clone(),
                        index: i,
                        expected,
                        found: v.kind(),
                    })
                }
                _ => return Err(RuntimeError::CorruptFrame { at, op }),
            }
        }
        let zeroed = method
            .locals
            .iter()
            .map(|&k| Value::zeroed(k).ok_or(RuntimeError::CorruptFrame { at, op }))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, value) in zeroed.into_iter().enumerate() {
            self.put(f.osp + i, Slot::Value(value));
        }
        self.put(sp, Slot::Link(f.sp));
        self.records.push(CallRecord {
            method: index,
            return_ip: f.ip,
        });

        f.lap = lap;
        f.sp = sp;
        f.osp = sp + 1;
        f.ip = method.body_offset as usize;
        Ok(())
    }

    /// Close the active frame, optionally handing `result` to the caller.
    ///
    /// The callee's slots are released. With a result, the caller sees it
    /// as its single new top operand where the arguments used to be.
    pub fn close_frame(
        &mut self,
        f: &mut Frame,
        pool: &ConstantPool,
        result: Option<Value>,
        at: usize,
        op: &'static str,
    ) -> Result<Return, RuntimeError> {
        let corrupt = RuntimeError::CorruptFrame { at, op };
        let Some(record) = self.records.last().copied() else {
            return Err(corrupt);
        };

        if self.records.len() == 1 {
            self.records.pop();
            return Ok(Return::Finished(result));
        }

        let caller = self.records[self.records.len() - 2];
        let caller_width = pool
            .method(caller.method)
            .map(|m| m.frame_width())
            .ok_or_else(|| corrupt.clone())?;
        let caller_sp = match self.slots.get(f.sp) {
            Some(Slot::Link(sp)) => *sp,
            _ => return Err(corrupt),
        };
        let caller_lap = caller_sp
            .checked_sub(caller_width)
            .ok_or_else(|| corrupt.clone())?;

        self.records.pop();
        let mut osp = f.lap;
        for slot in &mut self.slots[f.lap..f.osp] {
            *slot = Slot::Vacant;
        }
        if let Some(value) = result {
            self.put(osp, Slot::Value(value));
            osp += 1;
        }

        f.ip = record.return_ip;
        f.lap = caller_lap;
        f.sp = caller_sp;
        f.osp = osp;
        Ok(Return::Resumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn desc(params: Vec<Kind>, locals: Vec<Kind>, body: u32) -> MethodDescriptor {
        MethodDescriptor::new("m", None, params, locals, body)
    }

    /// A stack with an entry frame for `main` (pool index 0) already open.
    fn entered(pool: &ConstantPool) -> (ExecStack, Frame) {
        let mut stack = ExecStack::new(64);
        let mut f = Frame::default();
        let main = pool.method(0).unwrap();
        stack.open_frame(&mut f, 0, main, 0, "call").unwrap();
        (stack, f)
    }

    fn pool_of(methods: Vec<MethodDescriptor>) -> ConstantPool {
        ConstantPool::from_values(methods.into_iter().map(Value::method).collect())
    }

    #[test]
    fn entry_frame_layout() {
        let pool = pool_of(vec![desc(vec![], vec![Kind::Integer, Kind::String], 7)]);
        let (stack, f) = entered(&pool);
        assert_eq!(f, Frame { ip: 7, lap: 0, sp: 2, osp: 3 });
        assert_eq!(stack.slot(0), Some(&Slot::Value(Value::Integer(0))));
        assert_eq!(stack.slot(1), Some(&Slot::Value(Value::string(""))));
        assert_eq!(stack.slot(2), Some(&Slot::Link(0)));
        assert_eq!(stack.operand_depth(&f), 0);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn open_then_close_restores_caller() {
        let pool = pool_of(vec![
            desc(vec![], vec![Kind::Integer], 0),
            desc(vec![Kind::Integer, Kind::Integer], vec![Kind::String], 40),
        ]);
        let (mut stack, mut f) = entered(&pool);
        f.ip = 11;
        stack.push(&mut f, Value::Integer(1), 0, "ipush").unwrap();
        stack.push(&mut f, Value::Integer(2), 0, "ipush").unwrap();
        let before = f;

        let callee = pool.method(1).unwrap();
        stack.open_frame(&mut f, 1, callee, 11, "call").unwrap();
        assert_eq!(f.lap, before.osp - 2);
        assert_eq!(f.sp, before.osp + 1);
        assert_eq!(f.ip, 40);
        assert_eq!(stack.depth(), 2);

        let back = stack.close_frame(&mut f, &pool, None, 40, "ret").unwrap();
        assert_eq!(back, Return::Resumed);
        assert_eq!(f.sp, before.sp);
        assert_eq!(f.lap, before.lap);
        assert_eq!(f.ip, before.ip);
        assert_eq!(f.osp, before.osp - 2);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn returned_value_replaces_arguments() {
        let pool = pool_of(vec![
            desc(vec![], vec![], 0),
            desc(vec![Kind::Integer], vec![], 0),
        ]);
        let (mut stack, mut f) = entered(&pool);
        stack.push(&mut f, Value::Integer(9), 0, "ipush").unwrap();
        let before = f;
        stack
            .open_frame(&mut f, 1, pool.method(1).unwrap(), 0, "call")
            .unwrap();
        stack
            .close_frame(&mut f, &pool, Some(Value::Integer(81)), 0, "iret")
            .unwrap();
        assert_eq!(f.osp, before.osp);
        assert_eq!(stack.operand_depth(&f), 1);
        assert_eq!(stack.peek(&f, 0, 0, "t").unwrap(), &Value::Integer(81));
    }

    #[test]
    fn closing_the_outermost_frame_finishes() {
        let pool = pool_of(vec![desc(vec![], vec![], 0)]);
        let (mut stack, mut f) = entered(&pool);
        let before = f;
        let done = stack
            .close_frame(&mut f, &pool, Some(Value::Integer(3)), 0, "iret")
            .unwrap();
        assert_eq!(done, Return::Finished(Some(Value::Integer(3))));
        assert_eq!(f, before);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn argument_kinds_are_checked_before_mutation() {
        let pool = pool_of(vec![
            desc(vec![], vec![], 0),
            desc(vec![Kind::Integer, Kind::Integer], vec![], 0),
        ]);
        let (mut stack, mut f) = entered(&pool);
        stack.push(&mut f, Value::Integer(1), 0, "ipush").unwrap();
        stack.push(&mut f, Value::string("x"), 0, "cload").unwrap();
        let before = f;
        let err = stack
            .open_frame(&mut f, 1, pool.method(1).unwrap(), 5, "call")
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArgumentTypeMismatch {
                at: 5,
                op: "call",
                method: "m".into(),
                index: 1,
                expected: Kind::Integer,
                found: Kind::String
            }
        );
        assert_eq!(f, before);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn too_few_arguments_underflow() {
        let pool = pool_of(vec![
            desc(vec![], vec![], 0),
            desc(vec![Kind::Integer], vec![], 0),
        ]);
        let (mut stack, mut f) = entered(&pool);
        assert_eq!(
            stack.open_frame(&mut f, 1, pool.method(1).unwrap(), 0, "call"),
            Err(RuntimeError::OperandStackUnderflow { at: 0, op: "call" })
        );
    }

    #[test]
    fn frames_respect_capacity() {
        let pool = pool_of(vec![desc(vec![], vec![Kind::Integer; 8], 0)]);
        let mut stack = ExecStack::new(8);
        let mut f = Frame::default();
        assert_eq!(
            stack.open_frame(&mut f, 0, pool.method(0).unwrap(), 0, "call"),
            Err(RuntimeError::StackOverflow {
                at: 0,
                op: "call",
                capacity: 8
            })
        );
    }

    #[test]
    fn pop_on_empty_operand_area_changes_nothing() {
        let pool = pool_of(vec![desc(vec![], vec![Kind::Integer], 0)]);
        let (mut stack, mut f) = entered(&pool);
        let before = f;
        assert_eq!(
            stack.pop(&mut f, 3, "pop"),
            Err(RuntimeError::OperandStackUnderflow { at: 3, op: "pop" })
        );
        assert_eq!(f, before);
        assert_eq!(stack.slot(1), Some(&Slot::Link(0)));
    }

    #[test]
    fn locals_are_bounded_and_typed() {
        let pool = pool_of(vec![desc(vec![], vec![Kind::Integer, Kind::String], 0)]);
        let (mut stack, mut f) = entered(&pool);
        assert_eq!(
            stack.local(&f, 1, Kind::Integer, 0, "iload"),
            Err(RuntimeError::LocalTypeMismatch {
                at: 0,
                op: "iload",
                index: 1,
                expected: Kind::Integer,
                found: Kind::String
            })
        );
        assert!(matches!(
            stack.local_slot(&f, 2, 0, "iload"),
            Err(RuntimeError::LocalIndexOutOfBounds { index: 2, count: 2, .. })
        ));
        assert!(matches!(
            stack.local_slot(&f, -1, 0, "iload"),
            Err(RuntimeError::LocalIndexOutOfBounds { index: -1, .. })
        ));

        stack.push(&mut f, Value::Integer(5), 0, "ipush").unwrap();
        stack.store_local(&mut f, 0, Kind::Integer, 0, "istore").unwrap();
        assert_eq!(stack.local(&f, 0, Kind::Integer, 0, "iload").unwrap(), &Value::Integer(5));
        assert_eq!(stack.operand_depth(&f), 0);
    }

    #[test]
    fn store_with_wrong_local_kind_keeps_operand() {
        let pool = pool_of(vec![desc(vec![], vec![Kind::String], 0)]);
        let (mut stack, mut f) = entered(&pool);
        stack.push(&mut f, Value::Integer(5), 0, "ipush").unwrap();
        assert!(matches!(
            stack.store_local(&mut f, 0, Kind::Integer, 0, "istore"),
            Err(RuntimeError::LocalTypeMismatch { .. })
        ));
        assert_eq!(stack.operand_depth(&f), 1);
    }

    #[test]
    fn recursion_keeps_separate_return_addresses() {
        let pool = pool_of(vec![desc(vec![], vec![], 0), desc(vec![], vec![], 20)]);
        let (mut stack, mut f) = entered(&pool);
        let callee = Rc::clone(pool.method(1).unwrap());
        f.ip = 5;
        stack.open_frame(&mut f, 1, &callee, 0, "call").unwrap();
        f.ip = 25;
        stack.open_frame(&mut f, 1, &callee, 20, "call").unwrap();
        assert_eq!(stack.records()[1].return_ip, 5);
        assert_eq!(stack.records()[2].return_ip, 25);

        stack.close_frame(&mut f, &pool, None, 20, "ret").unwrap();
        assert_eq!(f.ip, 25);
        stack.close_frame(&mut f, &pool, None, 25, "ret").unwrap();
        assert_eq!(f.ip, 5);
    }
}
