/*
 * template/scanner.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Splits template source into text, `{{ output }}` and `{% tag %}` tokens.
//!
//! Whitespace control is applied here: a `-` just inside a delimiter trims
//! the whitespace of the adjacent text. Bodies of raw blocks (`raw`,
//! `comment`) are passed through as a single text token, and `{% # ... %}`
//! inline comments produce no token at all.

use crate::config::Config;
use crate::error::SyntaxError;
use crate::source::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'s> {
    Text(&'s str),
    Output {
        body: &'s str,
        /// Byte offset of `body` in the source.
        offset: usize,
        span: Span,
    },
    Tag {
        name: &'s str,
        args: &'s str,
        /// Byte offset of `args` in the source.
        args_offset: usize,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Output,
    Tag,
}

impl Delimiter {
    fn open(self) -> &'static str {
        match self {
            Delimiter::Output => "{{",
            Delimiter::Tag => "{%",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Delimiter::Output => "}}",
            Delimiter::Tag => "%}",
        }
    }
}

/// One delimited construct, before it is turned into a token.
struct Markup<'s> {
    delimiter: Delimiter,
    inner: &'s str,
    inner_offset: usize,
    span: Span,
    trim_left: bool,
    trim_right: bool,
}

pub fn scan<'s>(source: &'s str, config: &Config) -> Result<Vec<Token<'s>>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while let Some(markup) = next_markup(source, pos)? {
        push_text(
            &mut tokens,
            &source[pos..markup.span.start],
            trim_next,
            markup.trim_left,
        );
        pos = markup.span.end;
        trim_next = markup.trim_right;

        match markup.delimiter {
            Delimiter::Output => tokens.push(Token::Output {
                body: markup.inner,
                offset: markup.inner_offset,
                span: markup.span,
            }),
            Delimiter::Tag => {
                if markup.inner.trim_start().starts_with('#') {
                    continue;
                }
                let (name, args, args_offset) = split_tag(&markup)?;
                tokens.push(Token::Tag {
                    name,
                    args,
                    args_offset,
                    span: markup.span,
                });

                let raw_end = config.block(name).filter(|b| b.raw).map(|b| b.end_tag.as_str());
                if let Some(end_tag) = raw_end {
                    let end = find_raw_end(source, pos, end_tag)?.ok_or_else(|| {
                        SyntaxError::new(
                            format!("'{}' block is not closed with '{}'", name, end_tag),
                            markup.span,
                        )
                    })?;
                    push_text(
                        &mut tokens,
                        &source[pos..end.span.start],
                        trim_next,
                        end.trim_left,
                    );
                    let (name, args, args_offset) = split_tag(&end)?;
                    tokens.push(Token::Tag {
                        name,
                        args,
                        args_offset,
                        span: end.span,
                    });
                    pos = end.span.end;
                    trim_next = end.trim_right;
                }
            }
        }
    }

    push_text(&mut tokens, &source[pos..], trim_next, false);
    Ok(tokens)
}

fn push_text<'s>(tokens: &mut Vec<Token<'s>>, text: &'s str, trim_start: bool, trim_end: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    let text = if trim_end { text.trim_end() } else { text };
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
}

/// Find the next `{{` or `{%` at or after `from` and read up to its closing
/// delimiter.
fn next_markup(source: &str, from: usize) -> Result<Option<Markup<'_>>, SyntaxError> {
    let bytes = source.as_bytes();
    let mut search = from;
    let (start, delimiter) = loop {
        let Some(found) = source[search..].find('{') else {
            return Ok(None);
        };
        let at = search + found;
        match bytes.get(at + 1) {
            Some(b'{') => break (at, Delimiter::Output),
            Some(b'%') => break (at, Delimiter::Tag),
            _ => search = at + 1,
        }
    };

    let mut inner_start = start + 2;
    let trim_left = bytes.get(inner_start) == Some(&b'-');
    if trim_left {
        inner_start += 1;
    }
    let Some(close_at) = find_close(source, inner_start, delimiter.close()) else {
        return Err(SyntaxError::new(
            format!(
                "'{}' was never closed with '{}'",
                delimiter.open(),
                delimiter.close()
            ),
            Span::new(start, source.len()),
        ));
    };
    let trim_right = close_at > inner_start && bytes[close_at - 1] == b'-';
    let inner_end = if trim_right { close_at - 1 } else { close_at };

    Ok(Some(Markup {
        delimiter,
        inner: &source[inner_start..inner_end],
        inner_offset: inner_start,
        span: Span::new(start, close_at + 2),
        trim_left,
        trim_right,
    }))
}

/// Position of `close`, skipping over quoted strings so that `{{ "}}" }}`
/// closes at the second `}}`.
///
/// A quote whose match is missing, or lies past the start of another
/// `{{`/`{%`, is an ordinary character; the expression parser reports it.
/// Inline comments (`{% # ... %}`) never treat quotes as strings.
fn find_close(source: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let close = close.as_bytes();
    let skip_quotes = !(close == b"%}" && source[from..].trim_start().starts_with('#'));
    let mut i = from;
    while i < bytes.len() {
        let c = bytes[i];
        if skip_quotes && (c == b'"' || c == b'\'') {
            let quoted = bytes[i + 1..]
                .iter()
                .position(|&b| b == c)
                .filter(|&len| !opens_markup(&bytes[i + 1..i + 1 + len]));
            if let Some(len) = quoted {
                i += len + 2;
                continue;
            }
        }
        if bytes[i..].starts_with(close) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn opens_markup(bytes: &[u8]) -> bool {
    bytes
        .windows(2)
        .any(|w| w[0] == b'{' && (w[1] == b'{' || w[1] == b'%'))
}

/// Find the `{% end_tag %}` that closes a raw block whose body starts at
/// `from`. Tags and outputs inside the body are not interpreted.
fn find_raw_end<'s>(
    source: &'s str,
    from: usize,
    end_tag: &str,
) -> Result<Option<Markup<'s>>, SyntaxError> {
    let mut search = from;
    while let Some(found) = source[search..].find("{%") {
        let at = search + found;
        if let Some(markup) = next_markup(source, at)? {
            if markup.inner.trim() == end_tag {
                return Ok(Some(markup));
            }
        }
        search = at + 2;
    }
    Ok(None)
}

/// Split tag content into its name and arguments.
fn split_tag<'s>(markup: &Markup<'s>) -> Result<(&'s str, &'s str, usize), SyntaxError> {
    let inner = markup.inner;
    let leading = inner.len() - inner.trim_start().len();
    let rest = &inner[leading..];
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return Err(SyntaxError::new("tag name expected", markup.span));
    }
    let name = &rest[..name_len];
    let args = &rest[name_len..];
    let args_offset = markup.inner_offset + leading + name_len;
    Ok((name, args, args_offset))
}
