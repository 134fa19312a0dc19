//! Parser for facevm assembly: tokens → constant pool and code.
//!
//! Input comes in three parts, in order: the `const N` header, exactly N
//! constant lines, then labels and instructions. A label `name:` sets the
//! body offset of the method constant called `name` to the offset of the
//! next instruction.

use facevm_common::{Image, Instruction, Kind, MethodDescriptor, Opcode, Value};

use crate::error::AsmError;
use crate::lexer::Token;

/// A method constant whose body offset may not be known yet.
#[derive(Debug)]
struct PendingMethod {
    name: String,
    return_type: Option<Kind>,
    params: Vec<Kind>,
    locals: Vec<Kind>,
    body: Option<u32>,
    line: usize,
}

#[derive(Debug)]
enum Pending {
    Value(Value),
    Method(PendingMethod),
}

/// Line-by-line assembler state.
#[derive(Debug, Default)]
pub(crate) struct Assembler {
    /// Declared pool size, once the header has been read.
    expected: Option<usize>,
    constants: Vec<Pending>,
    code: Vec<u8>,
    last_line: usize,
}

impl Assembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one tokenized line.
    pub(crate) fn feed(&mut self, tokens: &[Token], line: usize) -> Result<(), AsmError> {
        self.last_line = line;
        if tokens.is_empty() {
            return Ok(());
        }

        let Some(expected) = self.expected else {
            self.expected = Some(parse_header(tokens, line)?);
            return Ok(());
        };

        if self.constants.len() < expected {
            if !is_constant_line(tokens) {
                return Err(AsmError::ConstantCountMismatch {
                    line,
                    expected,
                    found: self.constants.len(),
                });
            }
            let constant = parse_constant(tokens, line)?;
            self.constants.push(constant);
            return Ok(());
        }

        if is_constant_line(tokens) {
            return Err(AsmError::ConstantCountMismatch {
                line,
                expected,
                found: expected + 1,
            });
        }
        self.parse_code(tokens, line)
    }

    /// Resolve bodies and build the image.
    pub(crate) fn finish(self) -> Result<Image, AsmError> {
        let line = self.last_line.max(1);
        let Some(expected) = self.expected else {
            return Err(AsmError::MissingHeader { line });
        };
        if self.constants.len() < expected {
            return Err(AsmError::ConstantCountMismatch {
                line,
                expected,
                found: self.constants.len(),
            });
        }

        let code_len = self.code.len();
        let constants = self
            .constants
            .into_iter()
            .map(|pending| match pending {
                Pending::Value(value) => Ok(value),
                Pending::Method(m) => match m.body {
                    Some(body) if (body as usize) < code_len => Ok(Value::method(
                        MethodDescriptor::new(m.name, m.return_type, m.params, m.locals, body),
                    )),
                    _ => Err(AsmError::MethodWithoutBody {
                        line: m.line,
                        name: m.name,
                    }),
                },
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Image::new(constants, self.code))
    }

    fn parse_code(&mut self, tokens: &[Token], line: usize) -> Result<(), AsmError> {
        let mut rest = tokens;
        while let Some((Token::Label(name), tail)) = rest.split_first() {
            self.define_label(name, line)?;
            rest = tail;
        }
        let Some((first, args)) = rest.split_first() else {
            return Ok(());
        };

        let mnemonic = match first {
            Token::Ident(s) => s.as_str(),
            other => {
                return Err(AsmError::UnexpectedToken {
                    line,
                    token: other.text(),
                })
            }
        };
        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| AsmError::UnknownOpcode {
            line,
            token: mnemonic.to_string(),
        })?;

        let operand = if opcode.has_operand() {
            let operand = match (opcode, args.first()) {
                (Opcode::Call, Some(Token::Ident(name))) => self.resolve_method(name, line)?,
                _ => expect_i32(args, 0, line, opcode.mnemonic(), 1)?,
            };
            expect_end(&args[1..], line)?;
            operand
        } else {
            expect_end(args, line)?;
            0
        };

        Instruction::new(opcode, operand).encode_into(&mut self.code);
        Ok(())
    }

    fn define_label(&mut self, name: &str, line: usize) -> Result<(), AsmError> {
        let offset = self.code.len() as u32;
        let method = self
            .constants
            .iter_mut()
            .find_map(|c| match c {
                Pending::Method(m) if m.name == name => Some(m),
                _ => None,
            })
            .ok_or_else(|| AsmError::UnknownLabel {
                line,
                name: name.to_string(),
            })?;
        if method.body.is_some() {
            return Err(AsmError::DuplicateLabel {
                line,
                name: name.to_string(),
            });
        }
        method.body = Some(offset);
        Ok(())
    }

    fn resolve_method(&self, name: &str, line: usize) -> Result<i32, AsmError> {
        self.constants
            .iter()
            .position(|c| matches!(c, Pending::Method(m) if m.name == name))
            .map(|i| i as i32)
            .ok_or_else(|| AsmError::UnresolvedMethod {
                line,
                name: name.to_string(),
            })
    }
}

fn parse_header(tokens: &[Token], line: usize) -> Result<usize, AsmError> {
    match tokens.first() {
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("const") => {}
        _ => return Err(AsmError::MissingHeader { line }),
    }
    let count = expect_number(&tokens[1..], 0, line, "const", 1)?;
    expect_end(&tokens[2..], line)?;
    usize::try_from(count)
        .ok()
        .filter(|&n| n <= u8::MAX as usize)
        .ok_or(AsmError::InvalidNumber {
            line,
            token: count.to_string(),
        })
}

/// A line whose first token is a single kind letter.
fn is_constant_line(tokens: &[Token]) -> bool {
    match tokens.first() {
        Some(Token::Ident(s)) => {
            let mut chars = s.chars();
            matches!((chars.next(), chars.next()), (Some(c), None) if Kind::from_letter(c.to_ascii_uppercase()).is_some())
        }
        _ => false,
    }
}

fn parse_constant(tokens: &[Token], line: usize) -> Result<Pending, AsmError> {
    let kind = expect_kind(tokens, 0, line, "constant", 1)?;
    let args = &tokens[1..];
    let what = match kind {
        Kind::Byte => "B",
        Kind::Integer => "I",
        Kind::String => "S",
        _ => "M",
    };

    let pending = match kind {
        Kind::Byte => {
            let n = expect_number(args, 0, line, what, 1)?;
            let n = i8::try_from(n).map_err(|_| AsmError::InvalidNumber {
                line,
                token: n.to_string(),
            })?;
            expect_end(&args[1..], line)?;
            Pending::Value(Value::Byte(n))
        }
        Kind::Integer => {
            let n = expect_i32(args, 0, line, what, 1)?;
            expect_end(&args[1..], line)?;
            Pending::Value(Value::Integer(n))
        }
        Kind::String => {
            let s = expect_string(args, 0, line, what, 1)?;
            expect_end(&args[1..], line)?;
            Pending::Value(Value::string(&s))
        }
        Kind::Method => {
            let name = expect_string(args, 0, line, what, 4)?;
            let return_type = expect_return_type(args, 1, line, what, 4)?;
            let locals = expect_signature(args, 2, line, what, 4)?;
            let params = expect_signature(args, 3, line, what, 4)?;
            // Optional explicit body offset, used when a label cannot be.
            let body = match args.get(4) {
                None => None,
                Some(_) => {
                    let offset = expect_number(args, 4, line, what, 5)?;
                    let offset = u32::try_from(offset).map_err(|_| AsmError::InvalidNumber {
                        line,
                        token: offset.to_string(),
                    })?;
                    expect_end(&args[5..], line)?;
                    Some(offset)
                }
            };
            Pending::Method(PendingMethod {
                name,
                return_type,
                params,
                locals,
                body,
                line,
            })
        }
        Kind::Float | Kind::Long | Kind::Double | Kind::Reference => {
            return Err(AsmError::UnsupportedConstant { line, kind })
        }
    };
    Ok(pending)
}

// ---- Argument helpers ----

fn missing(line: usize, what: &'static str, expected: usize) -> AsmError {
    AsmError::MissingArgument {
        line,
        what,
        expected,
    }
}

fn expect_number(
    args: &[Token],
    idx: usize,
    line: usize,
    what: &'static str,
    expected: usize,
) -> Result<i64, AsmError> {
    match args.get(idx) {
        Some(Token::Number(n)) => Ok(*n),
        Some(other) => Err(AsmError::UnexpectedToken {
            line,
            token: other.text(),
        }),
        None => Err(missing(line, what, expected)),
    }
}

fn expect_i32(
    args: &[Token],
    idx: usize,
    line: usize,
    what: &'static str,
    expected: usize,
) -> Result<i32, AsmError> {
    let n = expect_number(args, idx, line, what, expected)?;
    i32::try_from(n).map_err(|_| AsmError::InvalidNumber {
        line,
        token: n.to_string(),
    })
}

fn expect_string(
    args: &[Token],
    idx: usize,
    line: usize,
    what: &'static str,
    expected: usize,
) -> Result<String, AsmError> {
    match args.get(idx) {
        Some(Token::Str(s)) => Ok(s.clone()),
        Some(other) => Err(AsmError::UnexpectedToken {
            line,
            token: other.text(),
        }),
        None => Err(missing(line, what, expected)),
    }
}

fn kind_letter(token: &str, line: usize) -> Result<Kind, AsmError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Kind::from_letter(c.to_ascii_uppercase()),
        _ => None,
    }
    .ok_or_else(|| AsmError::UnknownType {
        line,
        token: token.to_string(),
    })
}

fn expect_kind(
    args: &[Token],
    idx: usize,
    line: usize,
    what: &'static str,
    expected: usize,
) -> Result<Kind, AsmError> {
    match args.get(idx) {
        Some(Token::Ident(s)) => kind_letter(s, line),
        Some(other) => Err(AsmError::UnexpectedToken {
            line,
            token: other.text(),
        }),
        None => Err(missing(line, what, expected)),
    }
}

/// A kind letter, or `V` for void.
fn expect_return_type(
    args: &[Token],
    idx: usize,
    line: usize,
    what: &'static str,
    expected: usize,
) -> Result<Option<Kind>, AsmError> {
    match args.get(idx) {
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("v") => Ok(None),
        _ => expect_kind(args, idx, line, what, expected).map(Some),
    }
}

/// `0`, or a count followed by that many kind letters (`2II`).
fn expect_signature(
    args: &[Token],
    idx: usize,
    line: usize,
    what: &'static str,
    expected: usize,
) -> Result<Vec<Kind>, AsmError> {
    let bad = |token: String| AsmError::BadSignature { line, token };
    match args.get(idx) {
        Some(Token::Number(0)) => Ok(Vec::new()),
        Some(Token::Number(n)) => Err(bad(n.to_string())),
        Some(Token::Ident(s)) => {
            let digits = s.bytes().take_while(u8::is_ascii_digit).count();
            let count: usize = s[..digits].parse().map_err(|_| bad(s.clone()))?;
            let kinds = s[digits..]
                .chars()
                .map(|c| kind_letter(c.encode_utf8(&mut [0; 4]), line))
                .collect::<Result<Vec<_>, _>>()?;
            if kinds.len() != count {
                return Err(bad(s.clone()));
            }
            Ok(kinds)
        }
        Some(other) => Err(AsmError::UnexpectedToken {
            line,
            token: other.text(),
        }),
        None => Err(missing(line, what, expected)),
    }
}

/// Check that there are no extra tokens.
fn expect_end(remaining: &[Token], line: usize) -> Result<(), AsmError> {
    match remaining.first() {
        Some(tok) => Err(AsmError::UnexpectedToken {
            line,
            token: tok.text(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_line;

    fn feed_all(text: &str) -> Result<Image, AsmError> {
        let mut asm = Assembler::new();
        for (i, line) in text.lines().enumerate() {
            let tokens = tokenize_line(line, i + 1)?;
            asm.feed(&tokens, i + 1)?;
        }
        asm.finish()
    }

    #[test]
    fn signature_specs() {
        let args = [
            Token::Number(0),
            Token::Ident("2IS".into()),
            Token::Ident("3II".into()),
            Token::Number(2),
        ];
        assert_eq!(expect_signature(&args, 0, 1, "M", 4), Ok(vec![]));
        assert_eq!(
            expect_signature(&args, 1, 1, "M", 4),
            Ok(vec![Kind::Integer, Kind::String])
        );
        assert_eq!(
            expect_signature(&args, 2, 1, "M", 4),
            Err(AsmError::BadSignature {
                line: 1,
                token: "3II".into()
            })
        );
        assert_eq!(
            expect_signature(&args, 3, 1, "M", 4),
            Err(AsmError::BadSignature {
                line: 1,
                token: "2".into()
            })
        );
    }

    #[test]
    fn return_types() {
        let args = [Token::Ident("V".into()), Token::Ident("i".into()), Token::Ident("Q".into())];
        assert_eq!(expect_return_type(&args, 0, 1, "M", 4), Ok(None));
        assert_eq!(expect_return_type(&args, 1, 1, "M", 4), Ok(Some(Kind::Integer)));
        assert_eq!(
            expect_return_type(&args, 2, 1, "M", 4),
            Err(AsmError::UnknownType {
                line: 1,
                token: "Q".into()
            })
        );
    }

    #[test]
    fn constants_of_every_encodable_kind() {
        let image = feed_all("const 4\nB -3\nI 70000\nS \"hi\"\nM \"main\" V 1S 0\nmain: ret\n").unwrap();
        assert_eq!(image.constants[0], Value::Byte(-3));
        assert_eq!(image.constants[1], Value::Integer(70000));
        assert_eq!(image.constants[2], Value::string("hi"));
        let main = image.constants[3].as_method().unwrap();
        assert_eq!(main.locals, vec![Kind::String]);
        assert_eq!(main.body_offset, 0);
    }

    #[test]
    fn byte_constant_out_of_range() {
        assert_eq!(
            feed_all("const 1\nB 200\n"),
            Err(AsmError::InvalidNumber {
                line: 2,
                token: "200".into()
            })
        );
    }

    #[test]
    fn labels_track_code_offsets() {
        let text = "const 2\nM \"main\" V 0 0\nM \"f\" V 0 0\nmain:\n ipush 1\n pop\nf: ret\n";
        let image = feed_all(text).unwrap();
        assert_eq!(image.constants[0].as_method().unwrap().body_offset, 0);
        assert_eq!(image.constants[1].as_method().unwrap().body_offset, 6);
    }

    #[test]
    fn explicit_body_offset() {
        let image = feed_all("const 1\nM \"main\" V 0 0 1\nnoop\nret\n").unwrap();
        assert_eq!(image.constants[0].as_method().unwrap().body_offset, 1);
    }

    #[test]
    fn call_by_name_resolves_to_pool_index() {
        let text = "const 3\nI 5\nM \"main\" V 0 0\nM \"f\" V 0 0\nmain: call f\nf: ret\n";
        let image = feed_all(text).unwrap();
        let decoded = image.instructions().unwrap();
        assert_eq!(decoded[0].1, Instruction::new(Opcode::Call, 2));
    }
}
