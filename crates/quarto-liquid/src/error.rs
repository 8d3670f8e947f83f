/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing and rendering.

use crate::source::{SourceLocation, Span};
use thiserror::Error;

/// A value could not be reshaped into a required shape.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A malformed expression or statement, with the offending span relative to
/// the text that was handed to the parser.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Failure reported by a filter callable.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ConversionError> for FilterError {
    fn from(err: ConversionError) -> Self {
        Self(err.message)
    }
}

/// Errors returned by a [`TemplateStore`](crate::store::TemplateStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("template not found: {name}")]
    NotFound { name: String },

    #[error("failed to read template {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("template {name} is not valid UTF-8")]
    InvalidUtf8 { name: String },
}

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template or expression. Raised at compile time.
    #[error("Syntax error{}: {message}", at(.location))]
    Syntax {
        message: String,
        location: Option<SourceLocation>,
    },

    /// A `{% tag %}` that is not registered.
    #[error("Undefined tag '{name}'{}", at(.location))]
    UndefinedTag {
        name: String,
        location: Option<SourceLocation>,
    },

    /// A `| filter` that is not registered.
    #[error("Undefined filter '{name}'{}", at(.location))]
    UndefinedFilter {
        name: String,
        location: Option<SourceLocation>,
    },

    /// A value could not be converted to the shape an operation needs.
    #[error("Conversion error{}: {error}", at(.location))]
    Conversion {
        error: ConversionError,
        location: Option<SourceLocation>,
    },

    /// A variable is not bound and strict variables are enabled.
    #[error("Undefined variable '{name}'{}", at(.location))]
    UndefinedVariable {
        name: String,
        location: Option<SourceLocation>,
    },

    /// An include could not be resolved through the template store.
    #[error("Include of '{name}' failed{}: {source}", at(.location))]
    Store {
        name: String,
        #[source]
        source: StoreError,
        location: Option<SourceLocation>,
    },

    /// An expression could not be evaluated (e.g. division by zero).
    #[error("Evaluation error{}: {message}", at(.location))]
    Evaluation {
        message: String,
        location: Option<SourceLocation>,
    },

    /// A filter failed while rendering.
    #[error("Filter '{name}' failed{}: {message}", at(.location))]
    Filter {
        name: String,
        message: String,
        location: Option<SourceLocation>,
    },

    /// Includes nested deeper than the configured limit.
    #[error("Recursive include detected (depth > {max_depth}): {name}")]
    RecursiveInclude { name: String, max_depth: usize },

    /// The render was cancelled by the caller.
    #[error("Rendering cancelled")]
    Cancelled,

    /// Writing rendered output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn at(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl TemplateError {
    pub fn syntax(message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            message: message.into(),
            location: None,
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        TemplateError::Evaluation {
            message: message.into(),
            location: None,
        }
    }

    pub fn filter(name: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Filter {
            name: name.into(),
            message: message.into(),
            location: None,
        }
    }

    /// The location attached to this error, if any.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            TemplateError::Syntax { location, .. }
            | TemplateError::UndefinedTag { location, .. }
            | TemplateError::UndefinedFilter { location, .. }
            | TemplateError::Conversion { location, .. }
            | TemplateError::UndefinedVariable { location, .. }
            | TemplateError::Store { location, .. }
            | TemplateError::Evaluation { location, .. }
            | TemplateError::Filter { location, .. } => location.as_ref(),
            TemplateError::RecursiveInclude { .. }
            | TemplateError::Cancelled
            | TemplateError::Io(_) => None,
        }
    }

    /// Attach a location unless the error already has one.
    ///
    /// Errors raised deep inside an expression don't know where they are;
    /// the node that evaluated the expression fills it in.
    pub fn with_location(mut self, new_location: SourceLocation) -> Self {
        match &mut self {
            TemplateError::Syntax { location, .. }
            | TemplateError::UndefinedTag { location, .. }
            | TemplateError::UndefinedFilter { location, .. }
            | TemplateError::Conversion { location, .. }
            | TemplateError::UndefinedVariable { location, .. }
            | TemplateError::Store { location, .. }
            | TemplateError::Evaluation { location, .. }
            | TemplateError::Filter { location, .. } => {
                if location.is_none() {
                    *location = Some(new_location);
                }
            }
            TemplateError::RecursiveInclude { .. }
            | TemplateError::Cancelled
            | TemplateError::Io(_) => {}
        }
        self
    }

    /// True for errors that are detected while compiling a template.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            TemplateError::Syntax { .. }
                | TemplateError::UndefinedTag { .. }
                | TemplateError::UndefinedFilter { .. }
        )
    }
}

impl From<ConversionError> for TemplateError {
    fn from(error: ConversionError) -> Self {
        TemplateError::Conversion {
            error,
            location: None,
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize) -> SourceLocation {
        SourceLocation {
            template: Some("t.liquid".to_string()),
            line,
            column: 4,
            offset: 10,
        }
    }

    #[test]
    fn test_with_location_fills_missing() {
        let err = TemplateError::syntax("unexpected token").with_location(loc(2));
        assert_eq!(err.location(), Some(&loc(2)));
        assert_eq!(
            err.to_string(),
            "Syntax error at t.liquid:2:4: unexpected token"
        );
    }

    #[test]
    fn test_with_location_keeps_existing() {
        let err = TemplateError::syntax("x")
            .with_location(loc(1))
            .with_location(loc(9));
        assert_eq!(err.location().map(|l| l.line), Some(1));
    }

    #[test]
    fn test_display_without_location() {
        let err = TemplateError::from(ConversionError::new("can't convert"));
        assert_eq!(err.to_string(), "Conversion error: can't convert");
        assert!(!err.is_compile_error());
    }

    #[test]
    fn test_compile_error_classification() {
        let err = TemplateError::UndefinedTag {
            name: "nope".to_string(),
            location: None,
        };
        assert!(err.is_compile_error());
        assert!(!TemplateError::Cancelled.is_compile_error());
    }
}
