//! facevm assembler: text ↔ image translation.
//!
//! # Usage
//!
//! ```
//! use facevm_assembler::{assemble, disassemble};
//!
//! let text = "\
//! const 1
//! M \"main\" V 0 0
//!
//! main:
//!   ipush 5
//!   iprint
//!   ret
//! ";
//! let image = assemble(text).unwrap();
//! let bytes = image.encode().unwrap();
//! assert_eq!(disassemble(&bytes).unwrap(), text);
//! ```
//!
//! # Text format
//!
//! ```text
//! const 3                 ; number of constants that follow
//! M "main" V 1I 0         ; method: name, return type, locals, params
//! M "add2" I 0 2II
//! S "hello, world"        ; also B <n> and I <n>
//!
//! main:                   ; sets the body offset of method "main"
//!   ipush 2
//!   ipush 3
//!   call add2             ; by name or by pool index
//!   iprint
//!   ret
//! add2:
//!   iload 0
//!   iload 1
//!   iadd
//!   iret
//! ```
//!
//! Return types are kind letters or `V` for void. Signatures are a count
//! followed by that many kind letters, or just `0`. Mnemonics are
//! case-insensitive. `;` starts a comment, as does `@` at the start of a
//! token.

pub mod error;

mod disassembler;
mod lexer;
mod parser;

pub use error::AsmError;

use facevm_common::{Image, ImageError};
use lexer::tokenize_line;
use parser::Assembler;

/// Assemble text into an image.
///
/// Returns the first error encountered.
pub fn assemble(text: &str) -> Result<Image, AsmError> {
    let mut assembler = Assembler::new();
    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let tokens = tokenize_line(line, line_num)?;
        assembler.feed(&tokens, line_num)?;
    }
    assembler.finish()
}

/// Disassemble an encoded image into canonical assembly text.
pub fn disassemble(bytes: &[u8]) -> Result<String, ImageError> {
    disassembler::disassemble(bytes)
}
