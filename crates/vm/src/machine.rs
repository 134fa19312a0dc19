//! Machine state: construction from an image, the run loop, teardown.

use std::fmt;
use std::io::Write;
use std::path::Path;

use facevm_common::Value;
use tracing::{debug, trace, warn};

use crate::error::{LoadError, RuntimeError};
use crate::execute::{fetch, handler_table, Exec, Flow};
use crate::io::Io;
use crate::loader::Image;
use crate::pool::ConstantPool;
use crate::stack::{ExecStack, Frame};

/// Default execution stack size, in slots.
pub const DEFAULT_STACK_CAPACITY: usize = 1024;
/// Default size of the reserved heap region, in bytes.
pub const DEFAULT_HEAP_CAPACITY: usize = 64 * 1024;
/// Method called implicitly once the constant pool is materialized.
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// Lifecycle of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    /// Loaded, entry frame open, not yet run.
    Ready,
    Running,
    /// Faulted by a run-time error.
    Halted,
    /// Ran to completion.
    Finished,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Init => "init",
            State::Ready => "ready",
            State::Running => "running",
            State::Halted => "halted",
            State::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Tunables for a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub stack_capacity: usize,
    pub heap_capacity: usize,
    pub entry_point: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            heap_capacity: DEFAULT_HEAP_CAPACITY,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }
}

impl MachineConfig {
    pub fn with_stack_capacity(mut self, slots: usize) -> Self {
        self.stack_capacity = slots;
        self
    }

    pub fn with_heap_capacity(mut self, bytes: usize) -> Self {
        self.heap_capacity = bytes;
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }
}

/// A loaded program, ready to run.
///
/// The machine owns the image bytes, the constant pool, the stack and
/// its I/O. Dropping it releases all of them.
#[derive(Debug)]
pub struct Machine {
    image: Image,
    code_start: usize,
    pool: ConstantPool,
    stack: ExecStack,
    frame: Frame,
    state: State,
    /// Reserved; no instruction addresses it yet.
    heap: Box<[u8]>,
    io: Io,
}

impl Machine {
    /// Read the image at `path` and load it.
    pub fn create(path: impl AsRef<Path>, config: MachineConfig, io: Io) -> Result<Self, LoadError> {
        let image = Image::open(path)?;
        Self::load(image, config, io)
    }

    /// Materialize the constant pool and perform the implicit call into
    /// the entry method. No machine exists unless both succeed.
    pub fn load(image: Image, config: MachineConfig, io: Io) -> Result<Self, LoadError> {
        let (pool, code_start) = ConstantPool::materialize(image.bytes())?;

        let mut stack = ExecStack::new(config.stack_capacity);
        let mut frame = Frame::default();
        let (index, entry) =
            pool.find_method(&config.entry_point)
                .ok_or_else(|| LoadError::NoEntryPoint {
                    name: config.entry_point.clone(),
                })?;
        stack
            .open_frame(&mut frame, index, entry, 0, "call")
            .map_err(LoadError::EntryCallFailed)?;
        debug!(
            entry = %config.entry_point,
            index,
            ip = frame.ip,
            "entry frame opened"
        );

        Ok(Self {
            image,
            code_start,
            pool,
            stack,
            frame,
            state: State::Ready,
            heap: vec![0; config.heap_capacity].into_boxed_slice(),
            io,
        })
    }

    /// Run until the entry method returns, `stop` executes, or an error
    /// faults the machine.
    ///
    /// Returns the entry method's return value, if it returned one. A
    /// machine runs at most once.
    pub fn run(&mut self) -> Result<Option<Value>, RuntimeError> {
        if self.state != State::Ready {
            return Err(RuntimeError::NotReady { state: self.state });
        }
        self.state = State::Running;

        match self.dispatch() {
            Ok(value) => {
                self.state = State::Finished;
                debug!(exit = ?value, "finished");
                Ok(value)
            }
            Err(err) => {
                self.state = State::Halted;
                // The error sink carries the user-facing diagnostic.
                debug!(error = %err, "machine halted");
                if let Err(e) = writeln!(self.io.error, "[-] {err}").and_then(|()| self.io.error.flush())
                {
                    warn!(error = %e, "could not write diagnostic");
                }
                Err(err)
            }
        }
    }

    fn dispatch(&mut self) -> Result<Option<Value>, RuntimeError> {
        let code = &self.image.bytes()[self.code_start..];
        let table = handler_table();
        let mut ex = Exec {
            pool: &self.pool,
            stack: &mut self.stack,
            io: &mut self.io,
        };

        loop {
            let (step, next_ip) = fetch(code, self.frame.ip)?;
            trace!(at = step.at, op = step.name, operand = step.operand, "dispatch");

            let mut frame = self.frame;
            frame.ip = next_ip;
            let flow = (table[step.opcode as usize].exec)(&mut ex, &mut frame, step)?;
            self.frame = frame;
            if let Flow::Finish(value) = flow {
                return Ok(value);
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Number of active calls.
    pub fn frame_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn operand_depth(&self) -> usize {
        self.stack.operand_depth(&self.frame)
    }

    /// Operands of the active frame, bottom to top.
    pub fn operands(&self) -> Vec<Value> {
        self.stack.operands(&self.frame).cloned().collect()
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn heap_capacity(&self) -> usize {
        self.heap.len()
    }

    pub fn stack_capacity(&self) -> usize {
        self.stack.capacity()
    }

    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }
}
