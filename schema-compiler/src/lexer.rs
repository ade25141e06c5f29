// Tokenizer for schema text.
// Comments are kept as tokens so the parser can attach doc comments.

use crate::ast::Span;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Integer(u64),
    Float(f64),
    /// Raw bytes; `\xNN` escapes may make them invalid UTF-8.
    String(Vec<u8>),
    Punct(char),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == c)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(text) if text == keyword)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::Comment(_))
    }

    /// How the token reads in an error message.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(text) => text.clone(),
            TokenKind::Integer(value) => value.to_string(),
            TokenKind::Float(value) => value.to_string(),
            TokenKind::String(_) => "string literal".to_string(),
            TokenKind::Punct(c) => c.to_string(),
            TokenKind::Comment(_) => "comment".to_string(),
        }
    }
}

const PUNCTUATION: &str = "(){}[],.;:=@$-*";

pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '#' {
            chars.next();
            let mut text = String::new();
            let mut end = start + 1;
            while let Some(&(i, c)) = chars.peek() {
                if c == '\n' {
                    break;
                }
                text.push(c);
                end = i + c.len_utf8();
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Comment(text),
                span: Span::new(start, end),
            });
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let mut ident = String::new();
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    ident.push(c);
                    end = i + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident(ident),
                span: Span::new(start, end),
            });
        } else if ch.is_ascii_digit() {
            let (kind, end) = lex_number(source, start, &mut chars, &mut errors);
            if let Some(kind) = kind {
                tokens.push(Token {
                    kind,
                    span: Span::new(start, end),
                });
            }
        } else if ch == '"' {
            chars.next();
            let mut value = Vec::new();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => {
                        end = Some(i + 1);
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((i, escape)) => match unescape(escape, &mut chars) {
                            Some(decoded) => value.push(decoded),
                            None => errors.push(ParseError::new(
                                Span::new(i - 1, i + escape.len_utf8()),
                                format!("Invalid escape sequence '\\{}'.", escape),
                            )),
                        },
                        None => break,
                    },
                    other => {
                        let mut buf = [0u8; 4];
                        value.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                    }
                }
            }
            match end {
                Some(end) => tokens.push(Token {
                    kind: TokenKind::String(value),
                    span: Span::new(start, end),
                }),
                None => errors.push(ParseError::new(
                    Span::new(start, source.len()),
                    "Unterminated string literal.",
                )),
            }
        } else if PUNCTUATION.contains(ch) {
            chars.next();
            tokens.push(Token {
                kind: TokenKind::Punct(ch),
                span: Span::new(start, start + 1),
            });
        } else {
            chars.next();
            errors.push(ParseError::new(
                Span::new(start, start + ch.len_utf8()),
                format!("Unexpected character '{}'.", ch.escape_default()),
            ));
        }
    }

    (tokens, errors)
}

fn unescape(
    escape: char,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Option<u8> {
    match escape {
        'n' => Some(b'\n'),
        't' => Some(b'\t'),
        'r' => Some(b'\r'),
        'a' => Some(0x07),
        'b' => Some(0x08),
        'f' => Some(0x0c),
        'v' => Some(0x0b),
        '0' => Some(0),
        '\\' | '"' | '\'' => Some(escape as u8),
        'x' => {
            let mut code = 0u8;
            for _ in 0..2 {
                let (_, digit) = chars.next_if(|(_, c)| c.is_ascii_hexdigit())?;
                code = code * 16 + digit.to_digit(16)? as u8;
            }
            Some(code)
        }
        _ => None,
    }
}

fn lex_number(
    source: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    errors: &mut Vec<ParseError>,
) -> (Option<TokenKind>, usize) {
    let bytes = source.as_bytes();
    let mut end = start;

    let is_hex = bytes.get(start) == Some(&b'0')
        && matches!(bytes.get(start + 1), Some(b'x') | Some(b'X'));

    let kind = if is_hex {
        chars.next();
        chars.next();
        end = start + 2;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_hexdigit() {
                end = i + 1;
                chars.next();
            } else {
                break;
            }
        }
        let digits = &source[start + 2..end];
        if digits.is_empty() {
            errors.push(ParseError::new(Span::new(start, end), "Malformed hex literal."));
            None
        } else {
            parse_integer(digits, 16, Span::new(start, end), errors)
        }
    } else {
        let mut is_float = false;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_digit() {
                end = i + 1;
                chars.next();
            } else if c == '.'
                && !is_float
                && chars.clone().nth(1).map_or(false, |(_, next)| next.is_ascii_digit())
            {
                is_float = true;
                end = i + 1;
                chars.next();
            } else if c == 'e' || c == 'E' {
                is_float = true;
                end = i + 1;
                chars.next();
                if let Some((i, sign)) = chars.next_if(|(_, s)| *s == '+' || *s == '-') {
                    end = i + sign.len_utf8();
                }
            } else {
                break;
            }
        }
        let text = &source[start..end];
        if is_float {
            match text.parse::<f64>() {
                Ok(value) => Some(TokenKind::Float(value)),
                Err(_) => {
                    errors.push(ParseError::new(Span::new(start, end), "Malformed float literal."));
                    None
                }
            }
        } else if text.len() > 1 && text.starts_with('0') {
            parse_integer(&text[1..], 8, Span::new(start, end), errors)
        } else {
            parse_integer(text, 10, Span::new(start, end), errors)
        }
    };

    // Reject things like `12abc`; consume the tail so it is reported once.
    if let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            let tail_start = end;
            while let Some((i, _)) = chars.next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_') {
                end = i + 1;
            }
            errors.push(ParseError::new(
                Span::new(tail_start, end),
                "Invalid character in number literal.",
            ));
            return (None, end);
        }
    }

    (kind, end)
}

fn parse_integer(
    digits: &str,
    radix: u32,
    span: Span,
    errors: &mut Vec<ParseError>,
) -> Option<TokenKind> {
    match u64::from_str_radix(digits, radix) {
        Ok(value) => Some(TokenKind::Integer(value)),
        Err(_) => {
            let message = if radix == 8 && digits.bytes().any(|b| b == b'8' || b == b'9') {
                "Invalid digit in octal literal."
            } else {
                "Integer literal is too large."
            };
            errors.push(ParseError::new(span, message));
            None
        }
    }
}
