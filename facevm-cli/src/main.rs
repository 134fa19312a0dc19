//! facevm CLI: assemble, run, and disassemble images.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input/assembly/load error
//! - 3: Runtime error

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use facevm_vm::machine::{DEFAULT_ENTRY_POINT, DEFAULT_HEAP_CAPACITY, DEFAULT_STACK_CAPACITY};
use tracing_subscriber::{fmt, EnvFilter};

/// Assemble and run programs for the facevm stack machine
#[derive(Parser, Debug)]
#[command(name = "facevm", version)]
#[command(about = "Assemble, run and disassemble facevm images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a text program into an image
    Assemble {
        /// Assembly source file
        input: PathBuf,

        /// Output image (defaults to the input with a .fvm extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load an image and run its entry method
    Run {
        /// Image file to run
        image: PathBuf,

        /// Execution stack capacity, in slots
        #[arg(long, env = "FACEVM_STACK_CAPACITY", default_value_t = DEFAULT_STACK_CAPACITY)]
        stack_capacity: usize,

        /// Heap capacity, in bytes
        #[arg(long, env = "FACEVM_HEAP_CAPACITY", default_value_t = DEFAULT_HEAP_CAPACITY)]
        heap_capacity: usize,

        /// Name of the method to enter
        #[arg(long, env = "FACEVM_ENTRY", default_value = DEFAULT_ENTRY_POINT)]
        entry: String,
    },

    /// Print an image as canonical assembly text
    Disassemble {
        /// Image file to disassemble
        image: PathBuf,
    },
}

fn init_logging() {
    // RUST_LOG overrides; warnings only by default.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Assemble { input, output } => commands::assemble(&input, output.as_deref()),
        Command::Run {
            image,
            stack_capacity,
            heap_capacity,
            entry,
        } => commands::run(&image, stack_capacity, heap_capacity, entry),
        Command::Disassemble { image } => commands::disassemble(&image),
    };

    if let Err(code) = result {
        process::exit(code);
    }
}
