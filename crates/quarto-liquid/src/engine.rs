/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The engine: grammar, options, template store and cache in one place.
//!
//! An [`Engine`] is built once and then shared. Parsing and rendering take
//! `&self`, so one engine can serve any number of threads; each render gets
//! its own [`RenderContext`].
//!
//! ```ignore
//! let engine = Engine::new();
//! let mut bindings = Bindings::new();
//! bindings.insert("name".into(), "World".into());
//! let out = engine.parse_and_render_string("Hello, {{ name | upcase }}!", &bindings)?;
//! assert_eq!(out, "Hello, WORLD!");
//! ```

use crate::cache::TemplateCache;
use crate::config::{BlockDef, Config, ConfigBuilder, EngineOptions, FilterDef};
use crate::error::{StoreError, TemplateError, TemplateResult};
use crate::filters::{register_extension_filters, register_standard_filters};
use crate::render::RenderContext;
use crate::store::{FileTemplateStore, TemplateStore};
use crate::tags::register_standard_tags;
use crate::template::{Render, TagSource, Template, render_nodes};
use crate::value::Bindings;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// A configured template engine.
pub struct Engine {
    config: Config,
    options: EngineOptions,
    store: Arc<dyn TemplateStore>,
    cache: TemplateCache,
}

impl Engine {
    /// Standard tags, standard and extension filters, default options, and a
    /// file store rooted at the current directory.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Like [`Engine::new`] with explicit options. The file store is rooted
    /// at `options.template_root` when set.
    pub fn with_options(options: EngineOptions) -> Self {
        Self::builder()
            .standard_tags()
            .standard_filters()
            .extension_filters()
            .options(options)
            .build()
    }

    /// An engine with no tags and no filters: only text and `{{ }}` output.
    pub fn basic() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Replace the store that `include` and `render` read from.
    ///
    /// Templates already in the cache stay there.
    pub fn register_template_store(&mut self, store: impl TemplateStore + 'static) {
        self.store = Arc::new(store);
    }

    /// Compile a template.
    pub fn parse_template(&self, source: &[u8]) -> TemplateResult<Template> {
        self.parse_template_named(source, None)
    }

    /// Compile a template whose name appears in error locations.
    pub fn parse_template_named(
        &self,
        source: &[u8],
        name: Option<&str>,
    ) -> TemplateResult<Template> {
        let text = std::str::from_utf8(source)
            .map_err(|e| {
                TemplateError::syntax(format!("template source is not valid UTF-8: {}", e))
            })?;
        Template::compile_named(text, name, &self.config)
    }

    /// Compile `source` and store it in the cache under `name`, so that
    /// `{% include name %}` uses it without consulting the store.
    ///
    /// Seeding the same name with the same version again returns the cached
    /// template without recompiling.
    pub fn parse_template_and_cache(
        &self,
        source: &[u8],
        name: &str,
        version: u64,
    ) -> TemplateResult<Arc<Template>> {
        self.cache
            .seed(name, version, || self.parse_template_named(source, Some(name)))
    }

    /// Compile and render in one step.
    pub fn parse_and_render(&self, source: &[u8], bindings: &Bindings) -> TemplateResult<Vec<u8>> {
        let mut out = Vec::new();
        self.parse_and_render_to(source, &mut out, bindings)?;
        Ok(out)
    }

    pub fn parse_and_render_string(
        &self,
        source: &str,
        bindings: &Bindings,
    ) -> TemplateResult<String> {
        let template = self.parse_template(source.as_bytes())?;
        self.render(&template, bindings)
    }

    /// Compile and stream the output to `out`.
    ///
    /// On error, `out` holds whatever was written before the failure.
    pub fn parse_and_render_to<W: Write>(
        &self,
        source: &[u8],
        out: &mut W,
        bindings: &Bindings,
    ) -> TemplateResult<()> {
        let template = self.parse_template(source)?;
        self.render_to(&template, out, bindings)
    }

    /// Render a compiled template to a string.
    pub fn render(&self, template: &Template, bindings: &Bindings) -> TemplateResult<String> {
        let mut out = Vec::new();
        self.render_to(template, &mut out, bindings)?;
        String::from_utf8(out)
            .map_err(|e| TemplateError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    pub fn render_to(
        &self,
        template: &Template,
        out: &mut dyn Write,
        bindings: &Bindings,
    ) -> TemplateResult<()> {
        let mut ctx = RenderContext::new(self, bindings);
        self.run(template, &mut ctx, out)
    }

    /// Render, stopping with [`TemplateError::Cancelled`] once `cancel` is
    /// set. The flag is checked before each node.
    pub fn render_to_cancellable(
        &self,
        template: &Template,
        out: &mut dyn Write,
        bindings: &Bindings,
        cancel: &AtomicBool,
    ) -> TemplateResult<()> {
        let mut ctx = RenderContext::new(self, bindings).with_cancellation(cancel);
        self.run(template, &mut ctx, out)
    }

    fn run(
        &self,
        template: &Template,
        ctx: &mut RenderContext<'_>,
        out: &mut dyn Write,
    ) -> TemplateResult<()> {
        // A break or continue outside any loop just ends the template.
        render_nodes(template.nodes(), ctx, out)?;
        out.flush()?;
        Ok(())
    }

    /// The compiled template for an `include`/`render` of `name`, read
    /// through the store on first use and cached afterwards.
    pub fn load_include(&self, name: &str) -> TemplateResult<Arc<Template>> {
        self.cache.get_or_load(name, || {
            tracing::debug!(template = %name, "Reading template from store");
            let store_error = |source| TemplateError::Store {
                name: name.to_string(),
                source,
                location: None,
            };
            let bytes = self.store.read_template(name).map_err(store_error)?;
            let text = String::from_utf8(bytes).map_err(|_| {
                store_error(StoreError::InvalidUtf8 {
                    name: name.to_string(),
                })
            })?;
            Template::compile_named(&text, Some(name), &self.config)
        })
    }

    /// Registered filter names, sorted.
    pub fn list_filters(&self) -> Vec<String> {
        self.config.list_filters()
    }

    /// Registered tag and block names, sorted.
    pub fn list_tags(&self) -> Vec<String> {
        self.config.list_tags()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Builder for an [`Engine`] with a custom grammar.
///
/// Nothing is registered by default; call [`EngineBuilder::standard_tags`]
/// and friends to start from the standard set.
pub struct EngineBuilder {
    grammar: ConfigBuilder,
    options: EngineOptions,
    store: Option<Arc<dyn TemplateStore>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            grammar: ConfigBuilder::new(),
            options: EngineOptions::default(),
            store: None,
        }
    }

    pub fn standard_tags(mut self) -> Self {
        register_standard_tags(&mut self.grammar);
        self
    }

    pub fn standard_filters(mut self) -> Self {
        register_standard_filters(&mut self.grammar);
        self
    }

    pub fn extension_filters(mut self) -> Self {
        register_extension_filters(&mut self.grammar);
        self
    }

    /// Register a tag. A later registration under the same name wins.
    pub fn tag<F>(mut self, name: &str, compiler: F) -> Self
    where
        F: Fn(&TagSource, &Config) -> TemplateResult<Arc<dyn Render>> + Send + Sync + 'static,
    {
        self.grammar.add_tag(name, compiler);
        self
    }

    pub fn block(mut self, def: BlockDef) -> Self {
        self.grammar.add_block(def);
        self
    }

    pub fn filter(mut self, def: FilterDef) -> Self {
        self.grammar.add_filter(def);
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn template_store(mut self, store: impl TemplateStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn build(self) -> Engine {
        let store = self.store.unwrap_or_else(|| {
            let root = self
                .options
                .template_root
                .clone()
                .unwrap_or_else(|| ".".into());
            Arc::new(FileTemplateStore::new(root))
        });
        Engine {
            config: self.grammar.build(),
            options: self.options,
            store,
            cache: TemplateCache::new(),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTemplateStore;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_engine_has_no_grammar() {
        let engine = Engine::basic();
        assert!(engine.list_tags().is_empty());
        assert!(engine.list_filters().is_empty());
        assert_eq!(
            engine
                .parse_and_render_string("{{ x }}", &Bindings::new())
                .unwrap(),
            ""
        );
        assert!(matches!(
            engine.parse_template(b"{% if x %}{% endif %}"),
            Err(TemplateError::UndefinedTag { .. })
        ));
    }

    #[test]
    fn test_lists_are_sorted() {
        let engine = Engine::new();
        let filters = engine.list_filters();
        let mut sorted = filters.clone();
        sorted.sort();
        assert_eq!(filters, sorted);
        assert!(filters.contains(&"jq".to_string()));
        assert!(engine.list_tags().contains(&"comment".to_string()));
    }

    #[test]
    fn test_non_utf8_source_is_syntax_error() {
        let engine = Engine::new();
        assert!(matches!(
            engine.parse_template(&[0x66, 0xff, 0x6f]),
            Err(TemplateError::Syntax { .. })
        ));
    }

    #[test]
    fn test_builder_custom_filter() {
        let engine = Engine::builder()
            .filter(FilterDef::new("twice", vec![crate::convert::Shape::Int], |args, _| {
                match args.first() {
                    Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
                    _ => Ok(Value::Nil),
                }
            }))
            .build();
        assert_eq!(
            engine
                .parse_and_render_string("{{ 21 | twice }}", &Bindings::new())
                .unwrap(),
            "42"
        );
    }

    #[test]
    fn test_include_from_store_is_cached() {
        let mut engine = Engine::new();
        engine.register_template_store(MemoryTemplateStore::with_templates([(
            "greeting.html",
            "Hi {{ who }}",
        )]));
        let mut bindings = Bindings::new();
        bindings.insert("who".to_string(), Value::from("there"));

        let out = engine
            .parse_and_render_string("{% include 'greeting.html' %}!", &bindings)
            .unwrap();
        assert_eq!(out, "Hi there!");
        assert!(engine.cache().contains("greeting.html"));
    }

    #[test]
    fn test_missing_include_is_store_error() {
        let mut engine = Engine::new();
        engine.register_template_store(MemoryTemplateStore::new());
        let err = engine
            .parse_and_render_string("{% include 'nope.html' %}", &Bindings::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Store {
                source: StoreError::NotFound { .. },
                ..
            }
        ));
        assert!(err.location().is_some());
    }
}
