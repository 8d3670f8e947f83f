/*
 * template/node.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::error::{TemplateError, TemplateResult};
use crate::expression::{Expr, evaluate};
use crate::render::RenderContext;
use crate::source::SourceLocation;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// How control leaves a node.
///
/// `break` and `continue` travel up the tree as return values until a loop
/// consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Normal,
    Break,
    Continue,
}

/// The runtime behaviour of a compiled tag or block.
pub trait Render: fmt::Debug + Send + Sync {
    fn render(&self, ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal>;
}

/// A node in the render tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Literal text, written as-is.
    Text(String),

    /// `{{ expr }}`
    Output {
        expr: Expr,
        location: SourceLocation,
    },

    /// `{% name args %}`
    Tag {
        name: String,
        location: SourceLocation,
        renderer: Arc<dyn Render>,
    },

    /// `{% name %}...{% endname %}`
    Block {
        name: String,
        location: SourceLocation,
        renderer: Arc<dyn Render>,
    },
}

impl Node {
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Node::Text(_) => None,
            Node::Output { location, .. }
            | Node::Tag { location, .. }
            | Node::Block { location, .. } => Some(location),
        }
    }

    /// Render this node. Errors that do not know their location yet are
    /// attributed to this node.
    pub fn render(
        &self,
        ctx: &mut RenderContext<'_>,
        out: &mut dyn Write,
    ) -> TemplateResult<Signal> {
        let result = match self {
            Node::Text(text) => out
                .write_all(text.as_bytes())
                .map(|()| Signal::Normal)
                .map_err(TemplateError::from),
            Node::Output { expr, .. } => evaluate(expr, ctx).and_then(|value| {
                write!(out, "{}", value)?;
                Ok(Signal::Normal)
            }),
            Node::Tag { renderer, .. } | Node::Block { renderer, .. } => renderer.render(ctx, out),
        };
        match (result, self.location()) {
            (Err(e), Some(location)) => Err(e.with_location(location.clone())),
            (result, _) => result,
        }
    }
}

/// Render a node sequence, stopping early on `break`/`continue`.
///
/// Cancellation is checked before each node.
pub fn render_nodes(
    nodes: &[Node],
    ctx: &mut RenderContext<'_>,
    out: &mut dyn Write,
) -> TemplateResult<Signal> {
    for node in nodes {
        ctx.check_cancelled()?;
        match node.render(ctx, out)? {
            Signal::Normal => {}
            signal => return Ok(signal),
        }
    }
    Ok(Signal::Normal)
}
