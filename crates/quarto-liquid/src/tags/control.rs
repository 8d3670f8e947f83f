/*
 * tags/control.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `if`, `unless` and `case`.

use crate::config::Config;
use crate::error::TemplateResult;
use crate::expression::{Expr, Production, Statement, evaluate, evaluate_condition};
use crate::render::RenderContext;
use crate::template::{BlockSource, Node, Render, Signal, TagSource, render_nodes};
use std::io::Write;
use std::sync::Arc;

#[derive(Debug)]
struct Branch {
    /// `None` for `else`.
    condition: Option<Expr>,
    body: Vec<Node>,
}

/// Renders the first branch whose condition holds.
#[derive(Debug)]
pub struct ConditionalRenderer {
    /// `unless` negates its own condition, not those of its `elsif`s.
    negate_first: bool,
    branches: Vec<Branch>,
}

impl Render for ConditionalRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal> {
        for (i, branch) in self.branches.iter().enumerate() {
            let taken = match &branch.condition {
                None => true,
                Some(condition) => {
                    evaluate_condition(condition, ctx)? != (i == 0 && self.negate_first)
                }
            };
            if taken {
                return render_nodes(&branch.body, ctx, out);
            }
        }
        Ok(Signal::Normal)
    }
}

pub fn compile_if(block: BlockSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    compile_conditional(block, config, false)
}

pub fn compile_unless(block: BlockSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    compile_conditional(block, config, true)
}

fn compile_conditional(
    block: BlockSource,
    config: &Config,
    negate_first: bool,
) -> TemplateResult<Arc<dyn Render>> {
    let mut branches = vec![Branch {
        condition: Some(condition(&block.tag, config)?),
        body: block.body,
    }];
    let mut seen_else = false;
    for clause in block.clauses {
        if seen_else {
            return Err(clause
                .tag
                .error(format!("'{}' cannot follow 'else'", clause.tag.name)));
        }
        let condition = if clause.tag.name == "else" {
            seen_else = true;
            None
        } else {
            Some(condition(&clause.tag, config)?)
        };
        branches.push(Branch {
            condition,
            body: clause.body,
        });
    }
    Ok(Arc::new(ConditionalRenderer {
        negate_first,
        branches,
    }))
}

fn condition(tag: &TagSource, config: &Config) -> TemplateResult<Expr> {
    if tag.has_no_args() {
        return Err(tag.error(format!("'{}' requires a condition", tag.name)));
    }
    tag.parse_expression(config)
}

/// `case`/`when`: renders the first `when` with a value equal to the subject.
#[derive(Debug)]
pub struct CaseRenderer {
    subject: Expr,
    whens: Vec<(Vec<Expr>, Vec<Node>)>,
    otherwise: Option<Vec<Node>>,
}

impl Render for CaseRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal> {
        let subject = evaluate(&self.subject, ctx)?;
        for (values, body) in &self.whens {
            for value in values {
                if evaluate(value, ctx)? == subject {
                    return render_nodes(body, ctx, out);
                }
            }
        }
        match &self.otherwise {
            Some(body) => render_nodes(body, ctx, out),
            None => Ok(Signal::Normal),
        }
    }
}

pub fn compile_case(block: BlockSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
    let subject = condition(&block.tag, config)?;
    let mut whens = Vec::new();
    let mut otherwise = None;
    for clause in block.clauses {
        if otherwise.is_some() {
            return Err(clause
                .tag
                .error(format!("'{}' cannot follow 'else'", clause.tag.name)));
        }
        if clause.tag.name == "else" {
            otherwise = Some(clause.body);
            continue;
        }
        if clause.tag.has_no_args() {
            return Err(clause.tag.error("'when' requires a value"));
        }
        match clause.tag.parse_statement(Production::When, config)? {
            Statement::When { values } => whens.push((values, clause.body)),
            _ => return Err(clause.tag.error("malformed 'when'")),
        }
    }
    Ok(Arc::new(CaseRenderer {
        subject,
        whens,
        otherwise,
    }))
}
