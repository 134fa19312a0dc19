//! Disassembler: image bytes → canonical assembly text.
//!
//! Output layout: the `const` header, one line per constant, a blank
//! line, then the code with a label before each method body and each
//! instruction indented by two spaces. Method bodies are given as labels
//! where possible; a method whose name is not a plain identifier, is
//! shared with an earlier method, or whose body is not on an instruction
//! boundary gets an explicit offset on its constant line instead.

use std::collections::HashSet;
use std::fmt::Write;

use facevm_common::{Image, ImageError, Kind, MethodDescriptor, Opcode, Value};

/// Disassemble an encoded image into canonical assembly text.
///
/// For any image whose method bodies lie inside its code, the output
/// reassembles to an identical image.
pub fn disassemble(bytes: &[u8]) -> Result<String, ImageError> {
    let image = Image::decode(bytes)?;
    let instructions = image.instructions()?;
    let boundaries: HashSet<usize> = instructions.iter().map(|(offset, _)| *offset).collect();

    let mut seen = HashSet::new();
    let labelled: Vec<bool> = image
        .constants
        .iter()
        .map(|c| match c {
            Value::Method(m) => {
                is_identifier(&m.name)
                    && seen.insert(m.name.as_str())
                    && boundaries.contains(&(m.body_offset as usize))
            }
            _ => false,
        })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "const {}", image.constants.len());
    for (constant, &label) in image.constants.iter().zip(&labelled) {
        out.push_str(&constant_line(constant, label));
        out.push('\n');
    }

    if !instructions.is_empty() {
        out.push('\n');
    }
    for (offset, instr) in &instructions {
        for (constant, _) in image.constants.iter().zip(&labelled).filter(|(_, l)| **l) {
            if let Value::Method(m) = constant {
                if m.body_offset as usize == *offset {
                    let _ = writeln!(out, "{}:", m.name);
                }
            }
        }

        let mnemonic = instr.opcode.mnemonic();
        if !instr.opcode.has_operand() {
            let _ = writeln!(out, "  {mnemonic}");
            continue;
        }
        let _ = write!(out, "  {mnemonic} {}", instr.operand);
        if instr.opcode == Opcode::Call {
            if let Some(m) = usize::try_from(instr.operand)
                .ok()
                .and_then(|i| image.constants.get(i))
                .and_then(Value::as_method)
            {
                let _ = write!(out, " ; {}", m.name);
            }
        }
        out.push('\n');
    }

    Ok(out)
}

fn constant_line(constant: &Value, labelled: bool) -> String {
    match constant {
        Value::Byte(n) => format!("B {n}"),
        Value::Integer(n) => format!("I {n}"),
        Value::String(s) => format!("S {}", quote(s)),
        Value::Method(m) => method_line(m, labelled),
        // Not encodable, so never decoded.
        other => format!("; unsupported {}", other.kind()),
    }
}

fn method_line(m: &MethodDescriptor, labelled: bool) -> String {
    let ret = m.return_type.map_or('V', |k| k.letter());
    let mut line = format!(
        "M {} {ret} {} {}",
        quote(&m.name),
        signature(&m.locals),
        signature(&m.params)
    );
    if !labelled {
        let _ = write!(line, " {}", m.body_offset);
    }
    line
}

fn signature(kinds: &[Kind]) -> String {
    if kinds.is_empty() {
        return "0".to_string();
    }
    let letters: String = kinds.iter().map(Kind::letter).collect();
    format!("{}{letters}", kinds.len())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Names that can be written as a `name:` label and a `call name` operand.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use facevm_common::instruction::encode_all;
    use facevm_common::Instruction;

    fn method(name: &str, body: u32) -> Value {
        Value::method(MethodDescriptor::new(
            name,
            Some(Kind::Integer),
            vec![Kind::Integer, Kind::Integer],
            vec![],
            body,
        ))
    }

    #[test]
    fn canonical_layout() {
        let code = encode_all(&[
            Instruction::new(Opcode::Call, 1),
            Instruction::bare(Opcode::Ret),
            Instruction::new(Opcode::Ipush, -1),
            Instruction::bare(Opcode::Iret),
        ]);
        let main = Value::method(MethodDescriptor::new("main", None, vec![], vec![Kind::String], 0));
        let bytes = Image::new(vec![main, method("add2", 6), Value::string("a\"b\n")], code)
            .encode()
            .unwrap();
        assert_eq!(
            disassemble(&bytes).unwrap(),
            "const 3\n\
             M \"main\" V 1S 0\n\
             M \"add2\" I 0 2II\n\
             S \"a\\\"b\\n\"\n\
             \n\
             main:\n  call 1 ; add2\n  ret\n\
             add2:\n  ipush -1\n  iret\n"
        );
    }

    #[test]
    fn awkward_methods_get_explicit_offsets() {
        let code = encode_all(&[Instruction::new(Opcode::Ipush, 1), Instruction::bare(Opcode::Iret)]);
        let bytes = Image::new(
            vec![method("f", 0), method("f", 0), method("two words", 0), method("mid", 2)],
            code,
        )
        .encode()
        .unwrap();
        let text = disassemble(&bytes).unwrap();
        assert!(text.contains("M \"f\" I 0 2II\n"));
        assert!(text.contains("M \"f\" I 0 2II 0\n"));
        assert!(text.contains("M \"two words\" I 0 2II 0\n"));
        assert!(text.contains("M \"mid\" I 0 2II 2\n"));
        assert_eq!(text.matches("f:").count(), 1);
    }

    #[test]
    fn no_code_no_blank_line() {
        let bytes = Image::new(vec![Value::Integer(1)], vec![]).encode().unwrap();
        assert_eq!(disassemble(&bytes).unwrap(), "const 1\nI 1\n");
    }

    #[test]
    fn undecodable_code_is_an_error() {
        let bytes = Image::new(vec![], vec![0x00, 0xEE]).encode().unwrap();
        assert_eq!(
            disassemble(&bytes),
            Err(ImageError::UnknownOpcode {
                offset: 1,
                opcode: 0xEE
            })
        );
    }
}
