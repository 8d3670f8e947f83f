/*
 * expression/lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer for the expression language used inside `{{ }}` and tag
//! arguments.

use crate::error::SyntaxError;
use crate::source::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword: `[A-Za-z_][A-Za-z0-9_-]*` with an optional
    /// trailing `?`.
    Ident(String),
    Int(i64),
    Float(f64),
    /// Single- or double-quoted string. There are no escape sequences.
    Str(String),
    Dot,
    DotDot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Pipe,
    Colon,
    Comma,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

impl TokenKind {
    /// Tokens after which a `-` is a binary operator rather than a sign.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Int(i) => i.to_string(),
            TokenKind::Float(x) => x.to_string(),
            TokenKind::Str(s) => format!("{:?}", s),
            TokenKind::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Pipe => "|",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Assign => "=",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Split `source` into tokens. The result always ends with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let bytes = source.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let after_operand = tokens.last().is_some_and(|t| t.kind.ends_operand());
        let negative_number = c == b'-'
            && !after_operand
            && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit);

        let kind = if c.is_ascii_digit() || negative_number {
            pos = scan_number(bytes, pos);
            number(&source[start..pos], Span::new(start, pos))?
        } else if c.is_ascii_alphabetic() || c == b'_' {
            pos += 1;
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'-')
            {
                pos += 1;
            }
            if bytes.get(pos) == Some(&b'?') {
                pos += 1;
            }
            TokenKind::Ident(source[start..pos].to_string())
        } else if c == b'"' || c == b'\'' {
            let Some(len) = source[pos + 1..].find(c as char) else {
                return Err(SyntaxError::new(
                    "unterminated string literal",
                    Span::new(start, source.len()),
                ));
            };
            let text = source[pos + 1..pos + 1 + len].to_string();
            pos += len + 2;
            TokenKind::Str(text)
        } else {
            let two = bytes.get(pos..pos + 2);
            let (kind, width) = match two {
                Some(b"..") => (TokenKind::DotDot, 2),
                Some(b"==") => (TokenKind::Eq, 2),
                Some(b"!=") | Some(b"<>") => (TokenKind::Ne, 2),
                Some(b"<=") => (TokenKind::Le, 2),
                Some(b">=") => (TokenKind::Ge, 2),
                _ => match c {
                    b'.' => (TokenKind::Dot, 1),
                    b'[' => (TokenKind::LBracket, 1),
                    b']' => (TokenKind::RBracket, 1),
                    b'(' => (TokenKind::LParen, 1),
                    b')' => (TokenKind::RParen, 1),
                    b'|' => (TokenKind::Pipe, 1),
                    b':' => (TokenKind::Colon, 1),
                    b',' => (TokenKind::Comma, 1),
                    b'=' => (TokenKind::Assign, 1),
                    b'<' => (TokenKind::Lt, 1),
                    b'>' => (TokenKind::Gt, 1),
                    b'+' => (TokenKind::Plus, 1),
                    b'-' => (TokenKind::Minus, 1),
                    b'*' => (TokenKind::Star, 1),
                    b'/' => (TokenKind::Slash, 1),
                    b'%' => (TokenKind::Percent, 1),
                    _ => {
                        let ch = source[pos..].chars().next().unwrap_or('?');
                        return Err(SyntaxError::new(
                            format!("unexpected character '{}'", ch),
                            Span::new(start, start + ch.len_utf8()),
                        ));
                    }
                },
            };
            pos += width;
            kind
        };

        tokens.push(Token {
            kind,
            span: Span::new(start, pos),
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(source.len(), source.len()),
    });
    Ok(tokens)
}

/// Advance over `-?digits(.digits)?`. A `.` only belongs to the number when a
/// digit follows it, so `1..5` lexes as a range.
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    if bytes[pos] == b'-' {
        pos += 1;
    }
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    pos
}

fn number(text: &str, span: Span) -> Result<TokenKind, SyntaxError> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| SyntaxError::new(format!("invalid number '{}'", text), span))
    } else {
        text.parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| SyntaxError::new(format!("integer '{}' out of range", text), span))
    }
}
