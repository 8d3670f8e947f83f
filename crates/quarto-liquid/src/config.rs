/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Grammar registry and engine options.
//!
//! A [`Config`] holds the tag compilers, block definitions and filters an
//! engine knows about. It is assembled once through a [`ConfigBuilder`] and
//! is read-only afterwards; parsing and rendering only ever see `&Config`.

use crate::convert::{Shape, convert};
use crate::error::{ConversionError, FilterError, TemplateError, TemplateResult};
use crate::template::{BlockSource, Render, TagSource};
use crate::value::{Map, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default limit for nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 50;

/// Compiles a simple tag (`{% name args %}`) into a render node.
pub type TagCompiler =
    Arc<dyn Fn(&TagSource, &Config) -> TemplateResult<Arc<dyn Render>> + Send + Sync>;

/// Compiles a block (`{% name %}...{% endname %}`) and its clauses.
pub type BlockCompiler =
    Arc<dyn Fn(BlockSource, &Config) -> TemplateResult<Arc<dyn Render>> + Send + Sync>;

/// The callable behind a filter. `args[0]` is the filter input; the rest are
/// the positional arguments, already converted to the declared shapes.
pub type FilterFn = dyn Fn(&[Value], &Map) -> Result<Value, FilterError> + Send + Sync;

/// Boundary definition of a block tag.
#[derive(Clone)]
pub struct BlockDef {
    pub name: String,
    /// Clause tags allowed directly inside the block (`elsif`, `else`, ...).
    pub clauses: Vec<String>,
    /// The terminator, `end<name>`.
    pub end_tag: String,
    /// Raw blocks keep their body as literal text; the scanner does not look
    /// for tags or outputs inside them.
    pub raw: bool,
    compiler: BlockCompiler,
}

impl BlockDef {
    pub fn new<F>(name: &str, clauses: &[&str], compiler: F) -> Self
    where
        F: Fn(BlockSource, &Config) -> TemplateResult<Arc<dyn Render>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            clauses: clauses.iter().map(|c| c.to_string()).collect(),
            end_tag: format!("end{}", name),
            raw: false,
            compiler: Arc::new(compiler),
        }
    }

    /// A block whose body is not parsed.
    pub fn raw<F>(name: &str, compiler: F) -> Self
    where
        F: Fn(BlockSource, &Config) -> TemplateResult<Arc<dyn Render>> + Send + Sync + 'static,
    {
        Self {
            raw: true,
            ..Self::new(name, &[], compiler)
        }
    }

    pub fn has_clause(&self, name: &str) -> bool {
        self.clauses.iter().any(|c| c == name)
    }

    pub fn compile(&self, source: BlockSource, config: &Config) -> TemplateResult<Arc<dyn Render>> {
        (self.compiler)(source, config)
    }
}

impl fmt::Debug for BlockDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDef")
            .field("name", &self.name)
            .field("clauses", &self.clauses)
            .field("end_tag", &self.end_tag)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

/// A registered filter: its parameter shapes and the callable.
///
/// `params[0]` is the shape of the filter input. Missing trailing arguments
/// are passed as nil before conversion, so optional parameters should use
/// [`Shape::optional`] or [`Shape::Any`].
#[derive(Clone)]
pub struct FilterDef {
    name: String,
    params: Vec<Shape>,
    func: Arc<FilterFn>,
}

impl FilterDef {
    pub fn new<F>(name: &str, params: Vec<Shape>, func: F) -> Self
    where
        F: Fn(&[Value], &Map) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            params,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Shape] {
        &self.params
    }

    /// Convert the arguments to the declared shapes and invoke the filter.
    pub fn call(&self, mut args: Vec<Value>, named: &Map) -> TemplateResult<Value> {
        if args.len() > self.params.len() {
            return Err(TemplateError::filter(
                &self.name,
                format!(
                    "expected at most {} argument(s), got {}",
                    self.params.len().saturating_sub(1),
                    args.len() - 1
                ),
            ));
        }
        args.resize(self.params.len(), Value::Nil);

        let mut converted = Vec::with_capacity(args.len());
        for (i, (arg, shape)) in args.iter().zip(&self.params).enumerate() {
            let value = convert(arg, shape).map_err(|e| {
                let which = if i == 0 {
                    "input".to_string()
                } else {
                    format!("argument {}", i)
                };
                ConversionError::new(format!("filter '{}' {}: {}", self.name, which, e))
            })?;
            converted.push(value);
        }

        (self.func)(&converted, named).map_err(|e| TemplateError::filter(&self.name, e.0))
    }
}

impl fmt::Debug for FilterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of the registered grammar.
#[derive(Clone, Default)]
pub struct Config {
    tags: HashMap<String, TagCompiler>,
    blocks: HashMap<String, BlockDef>,
    filters: HashMap<String, FilterDef>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn tag(&self, name: &str) -> Option<&TagCompiler> {
        self.tags.get(name)
    }

    pub fn block(&self, name: &str) -> Option<&BlockDef> {
        self.blocks.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.get(name)
    }

    /// Whether `name` is a clause of any registered block.
    pub fn is_clause(&self, name: &str) -> bool {
        self.blocks.values().any(|b| b.has_clause(name))
    }

    /// Whether `name` terminates any registered block.
    pub fn is_end_tag(&self, name: &str) -> bool {
        self.blocks.values().any(|b| b.end_tag == name)
    }

    /// Sorted names of all registered filters.
    pub fn list_filters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted names of all registered tags and blocks.
    pub fn list_tags(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tags
            .keys()
            .chain(self.blocks.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tags", &self.list_tags())
            .field("filters", &self.list_filters())
            .finish()
    }
}

/// Collects registrations and produces a [`Config`].
///
/// Registering a name twice replaces the earlier entry.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag<F>(&mut self, name: &str, compiler: F) -> &mut Self
    where
        F: Fn(&TagSource, &Config) -> TemplateResult<Arc<dyn Render>> + Send + Sync + 'static,
    {
        self.config.blocks.remove(name);
        self.config
            .tags
            .insert(name.to_string(), Arc::new(compiler));
        self
    }

    pub fn add_block(&mut self, def: BlockDef) -> &mut Self {
        self.config.tags.remove(&def.name);
        self.config.blocks.insert(def.name.clone(), def);
        self
    }

    pub fn add_filter(&mut self, def: FilterDef) -> &mut Self {
        self.config.filters.insert(def.name.clone(), def);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Runtime options of an engine.
///
/// Deserializable so hosts can keep them in their own configuration files;
/// missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Referencing an unbound variable is an error instead of nil.
    pub strict_variables: bool,
    /// Maximum nesting of `include`/`render`.
    pub max_include_depth: usize,
    /// Root directory of the default file template store. Defaults to the
    /// current directory.
    pub template_root: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict_variables: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            template_root: None,
        }
    }
}
