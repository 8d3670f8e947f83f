/*
 * tags/assign.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `assign` and `capture`.

use crate::config::Config;
use crate::error::{TemplateError, TemplateResult};
use crate::expression::{Expr, Production, Statement, evaluate, parse_expression};
use crate::render::RenderContext;
use crate::template::{BlockSource, Node, Render, Signal, TagSource, render_nodes};
use crate::value::Value;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Debug)]
pub struct AssignRenderer {
    variable: String,
    value: Expr,
}

impl Render for AssignRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, _out: &mut dyn Write) -> TemplateResult<Signal> {
        let value = evaluate(&self.value, ctx)?;
        ctx.assign(&self.variable, value);
        Ok(Signal::Normal)
    }
}

pub fn compile_assign(tag: &TagSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    match tag.parse_statement(Production::Assignment, config)? {
        Statement::Assignment { variable, value } => {
            Ok(Arc::new(AssignRenderer { variable, value }))
        }
        _ => Err(tag.error("malformed 'assign'")),
    }
}

/// Renders its body into a string and assigns it.
#[derive(Debug)]
pub struct CaptureRenderer {
    variable: String,
    body: Vec<Node>,
}

impl Render for CaptureRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, _out: &mut dyn Write) -> TemplateResult<Signal> {
        let mut buffer = Vec::new();
        let signal = render_nodes(&self.body, ctx, &mut buffer)?;
        let text = String::from_utf8(buffer)
            .map_err(|e| TemplateError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        ctx.assign(&self.variable, Value::String(text));
        Ok(signal)
    }
}

pub fn compile_capture(block: BlockSource, _config: &Config) -> TemplateResult<Arc<dyn Render>> {
    let variable = match parse_expression(&block.tag.args) {
        Ok(Expr::Variable(name)) => name,
        Ok(Expr::Literal(Value::String(name))) => name,
        _ => return Err(block.tag.error("'capture' requires a variable name")),
    };
    if let Some(clause) = block.clauses.first() {
        return Err(clause.tag.error("unexpected clause in 'capture'"));
    }
    Ok(Arc::new(CaptureRenderer {
        variable,
        body: block.body,
    }))
}
