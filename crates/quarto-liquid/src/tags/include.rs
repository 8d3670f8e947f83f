/*
 * tags/include.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `include` and `render`.
//!
//! Both load a template through the engine's template store (memoized in the
//! template cache) and render it in place. `include` shares the including
//! template's variables; `render` sees only the parameters passed to it.

use crate::config::Config;
use crate::error::{TemplateError, TemplateResult};
use crate::expression::{Expr, Production, Statement, evaluate};
use crate::render::RenderContext;
use crate::template::{Render, Signal, TagSource, render_nodes};
use crate::value::Map;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
pub struct IncludeRenderer {
    name: Expr,
    with: Option<(Expr, Option<String>)>,
    bindings: Vec<(String, Expr)>,
    isolated: bool,
}

impl Render for IncludeRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal> {
        let name = evaluate(&self.name, ctx)?.to_string();

        let max_depth = ctx.options().max_include_depth;
        if ctx.include_depth() >= max_depth {
            tracing::warn!(template = %name, max_depth, "Include depth limit reached");
            return Err(TemplateError::RecursiveInclude { name, max_depth });
        }

        let template = ctx.engine().load_include(&name)?;

        let mut locals = Map::new();
        if let Some((value, alias)) = &self.with {
            let key = alias.clone().unwrap_or_else(|| default_alias(&name));
            locals.insert(key, evaluate(value, ctx)?);
        }
        for (key, value) in &self.bindings {
            locals.insert(key.clone(), evaluate(value, ctx)?);
        }

        let mut child = ctx.include_child(locals, self.isolated);
        // break/continue do not escape an included template
        render_nodes(template.nodes(), &mut child, out)?;
        Ok(Signal::Normal)
    }
}

/// `include 'product.liquid' with x` binds `x` as `product`.
fn default_alias(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
        .to_string()
}

pub fn compile_include(tag: &TagSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    compile(tag, config, false)
}

pub fn compile_render(tag: &TagSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    compile(tag, config, true)
}

fn compile(tag: &TagSource, config: &Config, isolated: bool) -> TemplateResult<Arc<dyn Render>> {
    if tag.has_no_args() {
        return Err(tag.error(format!("'{}' requires a template name", tag.name)));
    }
    match tag.parse_statement(Production::Include, config)? {
        Statement::Include {
            name,
            with,
            bindings,
        } => Ok(Arc::new(IncludeRenderer {
            name,
            with,
            bindings,
            isolated,
        })),
        _ => Err(tag.error(format!("malformed '{}'", tag.name))),
    }
}
