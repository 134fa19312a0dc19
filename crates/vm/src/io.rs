//! I/O collaborators handed to the machine.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

/// Output, input and error sinks used by the machine.
///
/// Print operations write to `output` and flush after every write.
/// Fault diagnostics go to `error`.
pub struct Io {
    pub output: Box<dyn Write>,
    pub input: Box<dyn BufRead>,
    pub error: Box<dyn Write>,
}

impl Io {
    pub fn new(output: Box<dyn Write>, input: Box<dyn BufRead>, error: Box<dyn Write>) -> Self {
        Self {
            output,
            input,
            error,
        }
    }

    /// The process's standard streams.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(io::stdout()),
            Box::new(io::stdin().lock()),
            Box::new(io::stderr()),
        )
    }

    /// Discard all output; input is always at end of file.
    pub fn null() -> Self {
        Self::new(Box::new(io::sink()), Box::new(io::empty()), Box::new(io::sink()))
    }

    /// Capture output and errors into buffers the caller keeps.
    pub fn captured() -> (Self, SharedBuffer, SharedBuffer) {
        let output = SharedBuffer::default();
        let error = SharedBuffer::default();
        let io = Self::new(
            Box::new(output.clone()),
            Box::new(io::empty()),
            Box::new(error.clone()),
        );
        (io, output, error)
    }
}

impl std::fmt::Debug for Io {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Io").finish_non_exhaustive()
    }
}

/// A clonable in-memory writer. Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
