//! Tokenizer for facevm assembly text.

use crate::error::AsmError;

/// A single token from an assembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Mnemonic, kind letter, signature (`2II`) or method name.
    Ident(String),
    /// Decimal (optionally negative) or hex literal.
    Number(i64),
    /// Quoted string with escapes resolved.
    Str(String),
    /// `name:`
    Label(String),
}

impl Token {
    /// Source-like rendering for error messages.
    pub(crate) fn text(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("{s:?}"),
            Token::Label(s) => format!("{s}:"),
        }
    }
}

/// Tokenize a single line of assembly text.
///
/// Comments start with `;` anywhere, or `@` at the start of a token, and
/// run to the end of the line. Blank and comment-only lines yield no
/// tokens.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AsmError> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == ';' || c == '@' {
            break;
        }
        if c == '"' {
            chars.next();
            tokens.push(Token::Str(read_string(&mut chars, line_num)?));
            continue;
        }

        let mut end = line.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == ';' || c == '"' {
                end = i;
                break;
            }
            chars.next();
        }
        tokens.push(word_token(&line[start..end], line_num)?);
    }

    Ok(tokens)
}

fn read_string(
    chars: &mut impl Iterator<Item = (usize, char)>,
    line_num: usize,
) -> Result<String, AsmError> {
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(AsmError::UnterminatedString { line: line_num }),
            Some((_, '"')) => return Ok(out),
            Some((_, '\\')) => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 'r')) => '\r',
                    Some((_, 't')) => '\t',
                    Some((_, '\\')) => '\\',
                    Some((_, '"')) => '"',
                    Some((_, other)) => {
                        return Err(AsmError::InvalidEscape {
                            line: line_num,
                            escape: other,
                        })
                    }
                    None => return Err(AsmError::UnterminatedString { line: line_num }),
                };
                out.push(escaped);
            }
            // Images store strings NUL-terminated.
            Some((_, '\0')) => {
                return Err(AsmError::UnexpectedToken {
                    line: line_num,
                    token: "\\0".to_string(),
                })
            }
            Some((_, c)) => out.push(c),
        }
    }
}

fn word_token(word: &str, line_num: usize) -> Result<Token, AsmError> {
    let invalid = || AsmError::InvalidNumber {
        line: line_num,
        token: word.to_string(),
    };

    if let Some(name) = word.strip_suffix(':') {
        if !name.is_empty() {
            return Ok(Token::Label(name.to_string()));
        }
    }

    let (negative, digits) = match word.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let value = i64::from_str_radix(hex, 16).map_err(|_| invalid())?;
        return Ok(Token::Number(if negative { -value } else { value }));
    }

    let leading = digits.bytes().take_while(u8::is_ascii_digit).count();
    if leading == 0 {
        if negative {
            return Err(invalid());
        }
        return Ok(Token::Ident(word.to_string()));
    }
    if leading == digits.len() {
        let value: i64 = digits.parse().map_err(|_| invalid())?;
        return Ok(Token::Number(if negative { -value } else { value }));
    }
    // Signature such as `2II`: a count followed by kind letters.
    if !negative && digits[leading..].bytes().all(|b| b.is_ascii_alphabetic()) {
        return Ok(Token::Ident(word.to_string()));
    }
    Err(invalid())
}
