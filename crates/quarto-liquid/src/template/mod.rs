/*
 * template/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled templates.
//!
//! Source text is scanned into tokens ([`scanner`]), assembled into a tree
//! of [`Node`]s ([`compiler`]), and the tree is what gets rendered. A
//! [`Template`] is immutable once compiled and can be rendered any number of
//! times, from any number of threads.

pub mod compiler;
pub mod node;
pub mod scanner;

pub use compiler::{BlockSource, Clause, TagSource};
pub use node::{Node, Render, Signal, render_nodes};

use crate::config::Config;
use crate::error::TemplateResult;
use crate::source::SourceText;
use std::sync::Arc;

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
    source: Arc<SourceText>,
}

impl Template {
    /// Compile an anonymous template.
    pub fn compile(source: &str, config: &Config) -> TemplateResult<Self> {
        Self::compile_named(source, None, config)
    }

    /// Compile a template with a name. The name shows up in error locations.
    pub fn compile_named(
        source: &str,
        name: Option<&str>,
        config: &Config,
    ) -> TemplateResult<Self> {
        let source = Arc::new(SourceText::new(source, name));
        let nodes = compiler::compile(&source, config)?;
        Ok(Self { nodes, source })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn name(&self) -> Option<&str> {
        self.source.name()
    }

    pub fn source(&self) -> &str {
        self.source.text()
    }
}
