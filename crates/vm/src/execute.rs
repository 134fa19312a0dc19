//! Opcode handlers and the dispatch table.
//!
//! Every byte value maps to a handler; bytes outside the instruction set
//! map to one that reports `UnknownOpcode`. Handlers receive a copy of
//! the frame and validate everything they read before writing.

use std::io::Write;
use std::sync::OnceLock;

use facevm_common::opcode::{ALL_OPCODES, NUM_OPCODES};
use facevm_common::{ByteCursor, Kind, Opcode, Value};
use tracing::debug;

use crate::error::RuntimeError;
use crate::io::Io;
use crate::pool::ConstantPool;
use crate::stack::{ExecStack, Frame, Return};

/// What the loop does after a handler succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop dispatching; carries the exit value, if any.
    Finish(Option<Value>),
}

/// A decoded instruction as seen by its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Byte offset of the instruction.
    pub at: usize,
    pub opcode: u8,
    /// 0 for opcodes without operand.
    pub operand: i32,
    /// Mnemonic, for diagnostics.
    pub name: &'static str,
}

/// Machine parts a handler may touch.
pub struct Exec<'m> {
    pub pool: &'m ConstantPool,
    pub stack: &'m mut ExecStack,
    pub io: &'m mut Io,
}

pub type ExecFn = fn(&mut Exec<'_>, &mut Frame, Step) -> Result<Flow, RuntimeError>;

#[derive(Clone, Copy)]
pub struct Handler {
    pub name: &'static str,
    pub exec: ExecFn,
}

/// The 256-entry dispatch table.
pub fn handler_table() -> &'static [Handler; NUM_OPCODES] {
    static TABLE: OnceLock<[Handler; NUM_OPCODES]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [Handler {
            name: "unknown",
            exec: exec_unknown,
        }; NUM_OPCODES];
        for op in ALL_OPCODES {
            table[op as usize] = Handler {
                name: op.mnemonic(),
                exec: handler_for(op),
            };
        }
        table
    })
}

fn handler_for(op: Opcode) -> ExecFn {
    match op {
        Opcode::Noop => exec_noop,
        Opcode::Halt => exec_halt,
        Opcode::Stop => exec_stop,
        Opcode::Pop => exec_pop,
        Opcode::Call => exec_call,
        Opcode::Ret => exec_ret,
        Opcode::Iload => exec_iload,
        Opcode::Istore => exec_istore,
        Opcode::Ipush => exec_ipush,
        Opcode::Iadd => exec_iadd,
        Opcode::Isub => exec_isub,
        Opcode::Imult => exec_imult,
        Opcode::Idiv => exec_idiv,
        Opcode::Ineg => exec_ineg,
        Opcode::Iprint => exec_iprint,
        Opcode::Iret => exec_iret,
        Opcode::Iconst => exec_iconst,
        Opcode::Sload => exec_sload,
        Opcode::Sstore => exec_sstore,
        Opcode::Sprint => exec_sprint,
        Opcode::Sret => exec_sret,
        Opcode::Sconst => exec_sconst,
        Opcode::Cload => exec_cload,
    }
}

/// Decode the instruction at `ip`. Returns it with the offset of the
/// instruction that follows.
pub fn fetch(code: &[u8], ip: usize) -> Result<(Step, usize), RuntimeError> {
    let end = RuntimeError::UnexpectedEndOfCode { at: ip };
    let mut cursor = ByteCursor::at(code, ip);
    let opcode = cursor.read_u8().map_err(|_| end.clone())?;
    let operand = match Opcode::try_from(opcode) {
        Ok(op) if op.has_operand() => cursor.read_i32().map_err(|_| end)?,
        _ => 0,
    };
    let step = Step {
        at: ip,
        opcode,
        operand,
        name: handler_table()[opcode as usize].name,
    };
    Ok((step, cursor.position()))
}

// ---- Helpers ----

/// Constant `step.operand`, bounds checked.
fn constant<'p>(pool: &'p ConstantPool, step: Step) -> Result<&'p Value, RuntimeError> {
    usize::try_from(step.operand)
        .ok()
        .and_then(|i| pool.get(i))
        .ok_or(RuntimeError::ConstantIndexOutOfBounds {
            at: step.at,
            op: step.name,
            index: step.operand,
            size: pool.len(),
        })
}

fn constant_of_kind<'p>(
    pool: &'p ConstantPool,
    step: Step,
    kind: Kind,
) -> Result<&'p Value, RuntimeError> {
    let value = constant(pool, step)?;
    if value.kind() != kind {
        return Err(RuntimeError::ConstantTypeMismatch {
            at: step.at,
            op: step.name,
            index: step.operand as usize,
            expected: kind.name(),
            found: value.kind(),
        });
    }
    Ok(value)
}

fn write_line(io: &mut Io, step: Step, text: &str) -> Result<(), RuntimeError> {
    writeln!(io.output, "{text}")
        .and_then(|()| io.output.flush())
        .map_err(|e| RuntimeError::Output {
            at: step.at,
            op: step.name,
            reason: e.to_string(),
        })
}

fn load(ex: &mut Exec<'_>, f: &mut Frame, step: Step, kind: Kind) -> Result<Flow, RuntimeError> {
    let value = ex.stack.local(f, step.operand, kind, step.at, step.name)?.clone();
    ex.stack.push(f, value, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn store(ex: &mut Exec<'_>, f: &mut Frame, step: Step, kind: Kind) -> Result<Flow, RuntimeError> {
    ex.stack.store_local(f, step.operand, kind, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn push_constant(ex: &mut Exec<'_>, f: &mut Frame, step: Step, kind: Kind) -> Result<Flow, RuntimeError> {
    let value = constant_of_kind(ex.pool, step, kind)?.clone();
    ex.stack.push(f, value, step.at, step.name)?;
    Ok(Flow::Continue)
}

/// Check a return against the active method's declared return type;
/// `None` is a void return.
fn check_return(ex: &Exec<'_>, step: Step, found: Option<Kind>) -> Result<(), RuntimeError> {
    let corrupt = RuntimeError::CorruptFrame {
        at: step.at,
        op: step.name,
    };
    let method = ex
        .stack
        .records()
        .last()
        .and_then(|record| ex.pool.method(record.method))
        .ok_or(corrupt)?;
    if method.return_type == found {
        return Ok(());
    }
    let name = |kind: Option<Kind>| kind.map_or("void", |k| k.name());
    Err(RuntimeError::ReturnTypeMismatch {
        at: step.at,
        op: step.name,
        method: method.name.clone(),
        expected: name(method.return_type),
        found: name(found),
    })
}

fn return_value(ex: &mut Exec<'_>, f: &mut Frame, step: Step, kind: Kind) -> Result<Flow, RuntimeError> {
    check_return(ex, step, Some(kind))?;
    let value = ex.stack.peek_kind(f, 0, kind, step.at, step.name)?.clone();
    close(ex, f, step, Some(value))
}

fn close(ex: &mut Exec<'_>, f: &mut Frame, step: Step, value: Option<Value>) -> Result<Flow, RuntimeError> {
    match ex.stack.close_frame(f, ex.pool, value, step.at, step.name)? {
        Return::Resumed => Ok(Flow::Continue),
        Return::Finished(value) => Ok(Flow::Finish(value)),
    }
}

fn top_integer(ex: &Exec<'_>, f: &Frame, depth: usize, step: Step) -> Result<i32, RuntimeError> {
    let value = ex.stack.peek_kind(f, depth, Kind::Integer, step.at, step.name)?;
    match value {
        Value::Integer(n) => Ok(*n),
        _ => Err(RuntimeError::CorruptFrame {
            at: step.at,
            op: step.name,
        }),
    }
}

/// Pop `b`, pop `a`, push `op(a, b)`. `None` from `op` means division by
/// zero, reported with both operands still on the stack.
fn integer_binary(
    ex: &mut Exec<'_>,
    f: &mut Frame,
    step: Step,
    op: impl Fn(i32, i32) -> Option<i32>,
) -> Result<Flow, RuntimeError> {
    let b = top_integer(ex, f, 0, step)?;
    let a = top_integer(ex, f, 1, step)?;
    let result = op(a, b).ok_or(RuntimeError::DivisionByZero {
        at: step.at,
        op: step.name,
    })?;
    ex.stack.pop(f, step.at, step.name)?;
    ex.stack.replace_top(f, Value::Integer(result), step.at, step.name)?;
    Ok(Flow::Continue)
}

// ---- Special operations ----

fn exec_noop(_: &mut Exec<'_>, _: &mut Frame, _: Step) -> Result<Flow, RuntimeError> {
    Ok(Flow::Continue)
}

fn exec_halt(_: &mut Exec<'_>, _: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    debug!(at = step.at, code = step.operand, "halt");
    Ok(Flow::Continue)
}

fn exec_stop(_: &mut Exec<'_>, _: &mut Frame, _: Step) -> Result<Flow, RuntimeError> {
    Ok(Flow::Finish(None))
}

fn exec_pop(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    ex.stack.pop(f, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_call(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    let pool = ex.pool;
    let method = constant_of_kind(pool, step, Kind::Method)?
        .as_method()
        .ok_or(RuntimeError::CorruptFrame {
            at: step.at,
            op: step.name,
        })?;
    ex.stack
        .open_frame(f, step.operand as usize, method, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_ret(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    check_return(ex, step, None)?;
    close(ex, f, step, None)
}

// ---- Integer operations ----

fn exec_iload(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    load(ex, f, step, Kind::Integer)
}

fn exec_istore(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    store(ex, f, step, Kind::Integer)
}

fn exec_ipush(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    ex.stack
        .push(f, Value::Integer(step.operand), step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_iadd(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    integer_binary(ex, f, step, |a, b| Some(a.wrapping_add(b)))
}

fn exec_isub(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    integer_binary(ex, f, step, |a, b| Some(a.wrapping_sub(b)))
}

fn exec_imult(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    integer_binary(ex, f, step, |a, b| Some(a.wrapping_mul(b)))
}

fn exec_idiv(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    // i32::MIN / -1 wraps to i32::MIN.
    integer_binary(ex, f, step, |a, b| (b != 0).then(|| a.wrapping_div(b)))
}

fn exec_ineg(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    let n = top_integer(ex, f, 0, step)?;
    ex.stack
        .replace_top(f, Value::Integer(n.wrapping_neg()), step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_iprint(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    let n = top_integer(ex, f, 0, step)?;
    write_line(ex.io, step, &n.to_string())?;
    ex.stack.pop(f, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_iret(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    return_value(ex, f, step, Kind::Integer)
}

fn exec_iconst(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    push_constant(ex, f, step, Kind::Integer)
}

// ---- String operations ----

fn exec_sload(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    load(ex, f, step, Kind::String)
}

fn exec_sstore(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    store(ex, f, step, Kind::String)
}

fn exec_sprint(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    let text = ex
        .stack
        .peek_kind(f, 0, Kind::String, step.at, step.name)?
        .clone();
    write_line(ex.io, step, text.as_str().unwrap_or_default())?;
    ex.stack.pop(f, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_sret(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    return_value(ex, f, step, Kind::String)
}

fn exec_sconst(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    push_constant(ex, f, step, Kind::String)
}

// ---- Constant pool operations ----

fn exec_cload(ex: &mut Exec<'_>, f: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    let value = constant(ex.pool, step)?;
    if value.kind() == Kind::Method {
        return Err(RuntimeError::ConstantTypeMismatch {
            at: step.at,
            op: step.name,
            index: step.operand as usize,
            expected: "non-method",
            found: Kind::Method,
        });
    }
    let value = value.clone();
    ex.stack.push(f, value, step.at, step.name)?;
    Ok(Flow::Continue)
}

fn exec_unknown(_: &mut Exec<'_>, _: &mut Frame, step: Step) -> Result<Flow, RuntimeError> {
    Err(RuntimeError::UnknownOpcode {
        at: step.at,
        opcode: step.opcode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_byte() {
        let table = handler_table();
        for byte in 0..=255u8 {
            let name = table[byte as usize].name;
            match Opcode::try_from(byte) {
                Ok(op) => assert_eq!(name, op.mnemonic()),
                Err(_) => assert_eq!(name, "unknown"),
            }
        }
    }

    #[test]
    fn fetch_reads_operands_little_endian() {
        let code = [0x12, 0x05, 0x00, 0x00, 0x00, 0x13];
        let (step, next) = fetch(&code, 0).unwrap();
        assert_eq!(step.operand, 5);
        assert_eq!(step.name, "ipush");
        assert_eq!(next, 5);
        let (step, next) = fetch(&code, 5).unwrap();
        assert_eq!((step.opcode, step.operand, next), (0x13, 0, 6));
    }

    #[test]
    fn fetch_past_end_or_short_operand_fails() {
        assert_eq!(
            fetch(&[0x00], 1),
            Err(RuntimeError::UnexpectedEndOfCode { at: 1 })
        );
        assert_eq!(
            fetch(&[0x12, 0x01], 0),
            Err(RuntimeError::UnexpectedEndOfCode { at: 0 })
        );
    }

    #[test]
    fn unknown_bytes_take_no_operand() {
        let (step, next) = fetch(&[0xEE, 0x12], 0).unwrap();
        assert_eq!(step.name, "unknown");
        assert_eq!(next, 1);
    }
}
