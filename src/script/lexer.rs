use crate::error::ScriptError;

/// Punctuators, longest first so that greedy matching picks `===` over `==`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "...", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "+=",
    "-=", "*=", "/=", "%=", "++", "--", "(", ")", "{", "}", "[", "]", ",", ";", ":",
    ".", "?", "+", "-", "*", "/", "%", "<", ">", "=", "!",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(q) if q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(n) if n == name)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Punct(p) => format!("'{p}'"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Splits routine source into tokens. The final token is always `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // comments
        if c == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }
        if c == '/' && chars.get(pos + 1) == Some(&'*') {
            pos += 2;
            loop {
                match chars.get(pos) {
                    None => {
                        return Err(syntax(line, "unterminated comment"));
                    }
                    Some('*') if chars.get(pos + 1) == Some(&'/') => {
                        pos += 2;
                        break;
                    }
                    Some('\n') => line += 1,
                    _ => {}
                }
                pos += 1;
            }
            continue;
        }

        if c.is_ascii_digit()
            || (c == '.' && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
                pos += 1;
                if pos < chars.len() && (chars[pos] == '+' || chars[pos] == '-') {
                    pos += 1;
                }
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| syntax(line, format!("invalid number literal '{text}'")))?;
            tokens.push(Token { kind: TokenKind::Number(number), line });
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            let start_line = line;
            let (value, next) = lex_string(&chars, pos, &mut line)?;
            pos = next;
            tokens.push(Token { kind: TokenKind::Str(value), line: start_line });
            continue;
        }

        if is_ident_start(c) {
            let start = pos;
            while pos < chars.len() && is_ident_part(chars[pos]) {
                pos += 1;
            }
            let name: String = chars[start..pos].iter().collect();
            tokens.push(Token { kind: TokenKind::Ident(name), line });
            continue;
        }

        let punct = PUNCTUATORS.iter().find(|p| {
            p.chars().enumerate().all(|(i, pc)| chars.get(pos + i) == Some(&pc))
        });
        match punct {
            // `?.` followed by a digit is a ternary with a decimal number
            Some(&"?.") if chars.get(pos + 2).is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token { kind: TokenKind::Punct("?"), line });
                pos += 1;
            }
            Some(p) => {
                tokens.push(Token { kind: TokenKind::Punct(p), line });
                pos += p.len();
            }
            None => return Err(syntax(line, format!("unexpected character '{c}'"))),
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line });
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn syntax<S: Into<String>>(line: usize, message: S) -> ScriptError {
    ScriptError::Syntax { line, message: message.into() }
}

fn lex_string(
    chars: &[char],
    start: usize,
    line: &mut usize,
) -> Result<(String, usize), ScriptError> {
    let quote = chars[start];
    let mut pos = start + 1;
    let mut value = String::new();

    loop {
        let Some(&c) = chars.get(pos) else {
            return Err(syntax(*line, "unterminated string literal"));
        };
        pos += 1;
        match c {
            c if c == quote => break,
            '\n' if quote != '`' => {
                return Err(syntax(*line, "unterminated string literal"));
            }
            '\n' => {
                *line += 1;
                value.push('\n');
            }
            '\\' => {
                let Some(&esc) = chars.get(pos) else {
                    return Err(syntax(*line, "unterminated string literal"));
                };
                pos += 1;
                match esc {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    'v' => value.push('\u{b}'),
                    '0' => value.push('\0'),
                    'u' => {
                        let (ch, next) = lex_unicode_escape(chars, pos, *line)?;
                        value.push(ch);
                        pos = next;
                    }
                    '\n' => *line += 1,
                    other => value.push(other),
                }
            }
            other => value.push(other),
        }
    }

    Ok((value, pos))
}

/// Reads the part after `\u`: either `{XXXX}` or four hex digits, pairing
/// UTF-16 surrogates when a second `\uXXXX` follows.
fn lex_unicode_escape(
    chars: &[char],
    pos: usize,
    line: usize,
) -> Result<(char, usize), ScriptError> {
    let invalid = || syntax(line, "invalid unicode escape sequence");

    if chars.get(pos) == Some(&'{') {
        let end = (pos..chars.len()).find(|&i| chars[i] == '}').ok_or_else(invalid)?;
        let hex: String = chars[pos + 1..end].iter().collect();
        let code = u32::from_str_radix(&hex, 16).map_err(|_| invalid())?;
        return Ok((char::from_u32(code).ok_or_else(invalid)?, end + 1));
    }

    let read4 = |at: usize| -> Option<u32> {
        let hex: String = chars.get(at..at + 4)?.iter().collect();
        u32::from_str_radix(&hex, 16).ok()
    };

    let high = read4(pos).ok_or_else(invalid)?;
    let mut next = pos + 4;
    if (0xD800..0xDC00).contains(&high)
        && chars.get(next) == Some(&'\\')
        && chars.get(next + 1) == Some(&'u')
    {
        if let Some(low) = read4(next + 2).filter(|l| (0xDC00..0xE000).contains(l)) {
            next += 6;
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return Ok((char::from_u32(code).ok_or_else(invalid)?, next));
        }
    }
    Ok((char::from_u32(high).unwrap_or('\u{FFFD}'), next))
}
