/*
 * tags/iteration.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `for`, `break`, `continue` and `cycle`.

use crate::config::Config;
use crate::convert::{Shape, convert};
use crate::error::{TemplateError, TemplateResult};
use crate::expression::eval::range_bounds;
use crate::expression::{Expr, LoopModifiers, Production, Statement, evaluate};
use crate::render::RenderContext;
use crate::template::{BlockSource, Node, Render, Signal, TagSource, render_nodes};
use crate::value::{Map, Value};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct LoopRenderer {
    variable: String,
    source: Expr,
    modifiers: LoopModifiers,
    body: Vec<Node>,
    /// Rendered when there is nothing to iterate over.
    otherwise: Option<Vec<Node>>,
}

impl Render for LoopRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal> {
        let offset = self
            .modifiers
            .offset
            .as_ref()
            .map(|expr| count(expr, ctx))
            .transpose()?;
        let limit = self
            .modifiers
            .limit
            .as_ref()
            .map(|expr| count(expr, ctx))
            .transpose()?;

        let (length, items): (usize, Box<dyn Iterator<Item = Value>>) =
            if let Expr::Range(start, end) = &self.source {
                let (start, end) = range_bounds(start, end, ctx)?;
                range_items(start, end, offset, limit, self.modifiers.reversed)
            } else {
                let mut items = iteration_items(evaluate(&self.source, ctx)?);
                if let Some(offset) = offset {
                    items.drain(..offset.min(items.len()));
                }
                if let Some(limit) = limit {
                    items.truncate(limit);
                }
                if self.modifiers.reversed {
                    items.reverse();
                }
                (items.len(), Box::new(items.into_iter()))
            };

        if length == 0 {
            return match &self.otherwise {
                Some(body) => render_nodes(body, ctx, out),
                None => Ok(Signal::Normal),
            };
        }

        ctx.in_loop_scope(|ctx| {
            for (index, item) in items.enumerate() {
                ctx.set_local(&self.variable, item);
                ctx.set_local("forloop", forloop(index, length));
                if render_nodes(&self.body, ctx, out)? == Signal::Break {
                    break;
                }
            }
            Ok(Signal::Normal)
        })
    }
}

/// Integers of `(start..end)` after the loop modifiers, produced one at a
/// time.
fn range_items(
    start: i64,
    end: i64,
    offset: Option<usize>,
    limit: Option<usize>,
    reversed: bool,
) -> (usize, Box<dyn Iterator<Item = Value>>) {
    let total = (i128::from(end) - i128::from(start) + 1).max(0);
    let skip = offset.map_or(0, |n| n as i128).min(total);
    let mut len = total - skip;
    if let Some(limit) = limit {
        len = len.min(limit as i128);
    }
    let first = i128::from(start) + skip;
    let length = usize::try_from(len).unwrap_or(usize::MAX);
    let items = (0..length).map(move |i| {
        let step = i as i128;
        let n = if reversed { first + len - 1 - step } else { first + step };
        Value::Int(n as i64)
    });
    (length, Box::new(items))
}

/// The values a loop visits: sequence elements, or `[key, value]` pairs of a
/// mapping. Anything else, nil included, yields nothing.
fn iteration_items(value: Value) -> Vec<Value> {
    let value = match value {
        Value::Object(obj) => obj.to_liquid().unwrap_or_default(),
        other => other,
    };
    match value {
        Value::List(items) => items,
        Value::Map(map) => map
            .into_iter()
            .map(|(k, v)| Value::List(vec![Value::String(k), v]))
            .collect(),
        _ => Vec::new(),
    }
}

/// A non-negative count from a `limit:`/`offset:` expression.
fn count(expr: &Expr, ctx: &RenderContext<'_>) -> TemplateResult<usize> {
    match convert(&evaluate(expr, ctx)?, &Shape::Int)? {
        Value::Int(n) => Ok(usize::try_from(n).unwrap_or(0)),
        other => Err(TemplateError::evaluation(format!(
            "expected an integer, got {}",
            other.type_name()
        ))),
    }
}

fn forloop(index: usize, length: usize) -> Value {
    let mut map = Map::new();
    map.insert("first".to_string(), Value::Bool(index == 0));
    map.insert("last".to_string(), Value::Bool(index + 1 == length));
    map.insert("index".to_string(), Value::from(index + 1));
    map.insert("index0".to_string(), Value::from(index));
    map.insert("rindex".to_string(), Value::from(length - index));
    map.insert("rindex0".to_string(), Value::from(length - index - 1));
    map.insert("length".to_string(), Value::from(length));
    Value::Map(map)
}

pub fn compile_for(block: BlockSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    if block.tag.has_no_args() {
        return Err(block.tag.error("'for' requires 'variable in collection'"));
    }
    let Statement::Loop {
        variable,
        source,
        modifiers,
    } = block.tag.parse_statement(Production::Loop, config)?
    else {
        return Err(block.tag.error("malformed 'for'"));
    };

    let mut otherwise = None;
    for clause in block.clauses {
        if otherwise.is_some() {
            return Err(clause.tag.error("'for' allows only one 'else'"));
        }
        otherwise = Some(clause.body);
    }

    Ok(Arc::new(LoopRenderer {
        variable,
        source,
        modifiers,
        body: block.body,
        otherwise,
    }))
}

/// `break` and `continue`.
#[derive(Debug)]
pub struct JumpRenderer(Signal);

impl Render for JumpRenderer {
    fn render(&self, _ctx: &mut RenderContext<'_>, _out: &mut dyn Write) -> TemplateResult<Signal> {
        Ok(self.0)
    }
}

pub fn compile_break(_tag: &TagSource, _config: &Config) -> TemplateResult<Arc<dyn Render>> {
    Ok(Arc::new(JumpRenderer(Signal::Break)))
}

pub fn compile_continue(_tag: &TagSource, _config: &Config) -> TemplateResult<Arc<dyn Render>> {
    Ok(Arc::new(JumpRenderer(Signal::Continue)))
}

static NEXT_CYCLE_ID: AtomicUsize = AtomicUsize::new(0);

/// `cycle`: each execution emits the next value, wrapping around.
///
/// Occurrences with the same group name share a counter; an ungrouped
/// occurrence has its own.
#[derive(Debug)]
pub struct CycleRenderer {
    group: Option<Expr>,
    values: Vec<Expr>,
    id: usize,
}

impl Render for CycleRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal> {
        let key = match &self.group {
            Some(group) => format!("group:{}", evaluate(group, ctx)?),
            None => format!("cycle#{}", self.id),
        };
        let position = ctx.next_cycle(&key, self.values.len());
        if let Some(expr) = self.values.get(position) {
            write!(out, "{}", evaluate(expr, ctx)?)?;
        }
        Ok(Signal::Normal)
    }
}

pub fn compile_cycle(tag: &TagSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    if tag.has_no_args() {
        return Err(tag.error("'cycle' requires at least one value"));
    }
    let Statement::Cycle { group, values } = tag.parse_statement(Production::Cycle, config)?
    else {
        return Err(tag.error("malformed 'cycle'"));
    };
    Ok(Arc::new(CycleRenderer {
        group,
        values,
        id: NEXT_CYCLE_ID.fetch_add(1, Ordering::Relaxed),
    }))
}
