/*
 * template/compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Builds the render tree from scanner tokens.
//!
//! Blocks are matched with a stack of open frames. Each frame collects the
//! nodes of its current clause; when the terminator arrives the whole block
//! is handed to its registered compiler. Structural mistakes (unknown tags,
//! stray clauses or terminators, unclosed blocks) are reported here, so a
//! template that compiles never fails on structure while rendering.

use super::node::Node;
use super::scanner::{Token, scan};
use crate::config::{BlockDef, Config};
use crate::error::{SyntaxError, TemplateError, TemplateResult};
use crate::expression::{Expr, Production, Statement, parse_expression, parse_statement};
use crate::source::{SourceLocation, SourceText};
use std::sync::Arc;

/// A tag as written in the template, handed to tag and block compilers.
#[derive(Debug, Clone)]
pub struct TagSource {
    pub name: String,
    /// Everything after the tag name, untrimmed.
    pub args: String,
    /// Location of the opening `{%`.
    pub location: SourceLocation,
    args_offset: usize,
    source: Arc<SourceText>,
}

impl TagSource {
    /// Parse the arguments as an expression and check its filters exist.
    pub fn parse_expression(&self, config: &Config) -> TemplateResult<Expr> {
        compile_expression(&self.args, self.args_offset, &self.source, config)
    }

    /// Parse the arguments as the given statement form.
    pub fn parse_statement(
        &self,
        production: Production,
        config: &Config,
    ) -> TemplateResult<Statement> {
        let statement = parse_statement(production, &self.args)
            .map_err(|e| syntax_error(e, self.args_offset, &self.source))?;
        for expr in statement.expressions() {
            check_filters(expr, self.args_offset, &self.source, config)?;
        }
        Ok(statement)
    }

    /// True when the tag has no arguments.
    pub fn has_no_args(&self) -> bool {
        self.args.trim().is_empty()
    }

    /// A syntax error located at this tag.
    pub fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            message: message.into(),
            location: Some(self.location.clone()),
        }
    }
}

/// One clause of a block (`{% elsif %}`, `{% else %}`, ...) and its body.
#[derive(Debug)]
pub struct Clause {
    pub tag: TagSource,
    pub body: Vec<Node>,
}

/// A complete block handed to its compiler: the opening tag, the body up to
/// the first clause, then each clause in order.
#[derive(Debug)]
pub struct BlockSource {
    pub tag: TagSource,
    pub body: Vec<Node>,
    pub clauses: Vec<Clause>,
}

impl BlockSource {
    /// Concatenated text of the body, for blocks that keep their content
    /// verbatim.
    pub fn raw_text(&self) -> String {
        self.body
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

struct Frame<'c> {
    def: &'c BlockDef,
    tag: TagSource,
    body: Vec<Node>,
    clauses: Vec<Clause>,
}

impl Frame<'_> {
    fn current_body(&mut self) -> &mut Vec<Node> {
        match self.clauses.last_mut() {
            Some(clause) => &mut clause.body,
            None => &mut self.body,
        }
    }
}

/// Compile template source into a node list.
pub fn compile(source: &Arc<SourceText>, config: &Config) -> TemplateResult<Vec<Node>> {
    let tokens = scan(source.text(), config).map_err(|e| syntax_error(e, 0, source))?;
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();

    for token in tokens {
        let node = match token {
            Token::Text(text) => Node::Text(text.to_string()),
            Token::Output { body, offset, span } => Node::Output {
                expr: compile_expression(body, offset, source, config)?,
                location: source.location(span.start),
            },
            Token::Tag {
                name,
                args,
                args_offset,
                span,
            } => {
                let tag = TagSource {
                    name: name.to_string(),
                    args: args.to_string(),
                    location: source.location(span.start),
                    args_offset,
                    source: Arc::clone(source),
                };

                let closes_top = stack.last().is_some_and(|f| f.def.end_tag == name);
                let continues_top = stack.last().is_some_and(|f| f.def.has_clause(name));

                if closes_top {
                    let Some(frame) = stack.pop() else {
                        continue;
                    };
                    let location = frame.tag.location.clone();
                    let block_name = frame.def.name.clone();
                    let block = BlockSource {
                        tag: frame.tag,
                        body: frame.body,
                        clauses: frame.clauses,
                    };
                    let renderer = frame
                        .def
                        .compile(block, config)
                        .map_err(|e| e.with_location(location.clone()))?;
                    Node::Block {
                        name: block_name,
                        location,
                        renderer,
                    }
                } else if continues_top {
                    if let Some(frame) = stack.last_mut() {
                        frame.clauses.push(Clause {
                            tag,
                            body: Vec::new(),
                        });
                    }
                    continue;
                } else if let Some(def) = config.block(name) {
                    stack.push(Frame {
                        def,
                        tag,
                        body: Vec::new(),
                        clauses: Vec::new(),
                    });
                    continue;
                } else if let Some(compiler) = config.tag(name) {
                    let location = tag.location.clone();
                    let renderer =
                        compiler(&tag, config).map_err(|e| e.with_location(location.clone()))?;
                    Node::Tag {
                        name: name.to_string(),
                        location,
                        renderer,
                    }
                } else if config.is_clause(name) || config.is_end_tag(name) {
                    let message = match stack.last() {
                        Some(frame) => format!(
                            "unexpected '{}' inside '{}' block",
                            name, frame.def.name
                        ),
                        None => format!("unexpected '{}' outside of a block", name),
                    };
                    return Err(tag.error(message));
                } else {
                    return Err(TemplateError::UndefinedTag {
                        name: name.to_string(),
                        location: Some(tag.location),
                    });
                }
            }
        };

        match stack.last_mut() {
            Some(frame) => frame.current_body().push(node),
            None => root.push(node),
        }
    }

    if let Some(frame) = stack.pop() {
        return Err(frame.tag.error(format!(
            "'{}' block is not closed with '{}'",
            frame.def.name, frame.def.end_tag
        )));
    }

    tracing::debug!(
        template = source.name().unwrap_or("<anonymous>"),
        nodes = root.len(),
        "Compiled template"
    );
    Ok(root)
}

fn syntax_error(error: SyntaxError, base: usize, source: &SourceText) -> TemplateError {
    TemplateError::Syntax {
        message: error.message,
        location: Some(source.location(base + error.span.start)),
    }
}

fn compile_expression(
    text: &str,
    offset: usize,
    source: &SourceText,
    config: &Config,
) -> TemplateResult<Expr> {
    let expr = parse_expression(text).map_err(|e| syntax_error(e, offset, source))?;
    check_filters(&expr, offset, source, config)?;
    Ok(expr)
}

fn check_filters(
    expr: &Expr,
    offset: usize,
    source: &SourceText,
    config: &Config,
) -> TemplateResult<()> {
    let mut missing = None;
    expr.visit_filters(&mut |call| {
        if missing.is_none() && config.filter(&call.name).is_none() {
            missing = Some(call);
        }
    });
    match missing {
        Some(call) => Err(TemplateError::UndefinedFilter {
            name: call.name.clone(),
            location: Some(source.location(offset + call.span.start)),
        }),
        None => Ok(()),
    }
}
