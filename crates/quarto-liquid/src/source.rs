/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source text and locations for diagnostics.
//!
//! The scanner and the expression parser work on byte offsets. When an error
//! needs to be reported, the offset is turned into a 1-based line/column pair
//! against the template source it came from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first byte (inclusive).
    pub start: usize,
    /// Byte offset past the last byte (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Shift a span that is relative to a fragment so it is relative to the
    /// enclosing source.
    pub fn offset_by(self, base: usize) -> Self {
        Self {
            start: self.start + base,
            end: self.end + base,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A resolved location, suitable for error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Name of the template, if it has one (includes and cached templates do).
    pub template: Option<String>,
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based, in characters).
    pub column: usize,
    /// Byte offset from the start of the template.
    pub offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.template {
            Some(name) => write!(f, "{}:{}:{}", name, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

/// Template source with a line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    text: String,
    name: Option<String>,
    line_starts: Vec<usize>,
}

impl SourceText {
    pub fn new(text: impl Into<String>, name: Option<&str>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            text,
            name: name.map(str::to_string),
            line_starts,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Resolve a byte offset to a line/column location.
    ///
    /// Offsets past the end of the source are clamped to the end.
    pub fn location(&self, offset: usize) -> SourceLocation {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        let column = self.text[line_start..offset].chars().count() + 1;
        SourceLocation {
            template: self.name.clone(),
            line: line_index + 1,
            column,
            offset,
        }
    }
}
