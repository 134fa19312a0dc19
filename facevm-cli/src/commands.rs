//! CLI command implementations.

use std::fs;
use std::path::Path;

use facevm_vm::{Io, Machine, MachineConfig};
use tracing::debug;

/// Assemble a text program into an image file.
pub fn assemble(input: &Path, output: Option<&Path>) -> Result<(), i32> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("fvm"));

    let text = fs::read_to_string(input).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", input.display());
        1
    })?;

    let image = facevm_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let bytes = image.encode().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let instr_count = image.instructions().map(|i| i.len()).unwrap_or_default();

    fs::write(&output, &bytes).map_err(|e| {
        eprintln!("error: cannot write '{}': {e}", output.display());
        1
    })?;

    eprintln!(
        "assembled {} constants, {instr_count} instructions ({} bytes) -> {}",
        image.constants.len(),
        bytes.len(),
        output.display()
    );
    Ok(())
}

/// Load an image and run it against the process's stdio.
///
/// Program output goes to stdout. The machine reports its own run-time
/// faults on stderr, so only load errors are printed here.
pub fn run(
    image: &Path,
    stack_capacity: usize,
    heap_capacity: usize,
    entry: String,
) -> Result<(), i32> {
    let config = MachineConfig::default()
        .with_stack_capacity(stack_capacity)
        .with_heap_capacity(heap_capacity)
        .with_entry_point(entry);
    debug!(?config, "loading {}", image.display());

    let mut machine = Machine::create(image, config, Io::stdio()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    match machine.run() {
        Ok(Some(value)) => {
            debug!(%value, "entry method returned");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(_) => Err(3),
    }
}

/// Print an image as canonical assembly text.
pub fn disassemble(image: &Path) -> Result<(), i32> {
    let bytes = fs::read(image).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", image.display());
        1
    })?;
    let text = facevm_assembler::disassemble(&bytes).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    print!("{text}");
    Ok(())
}
