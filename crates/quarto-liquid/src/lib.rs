/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Liquid-compatible template engine for Quarto.
//!
//! Templates are text with embedded markup:
//!
//! - Output: `{{ page.title | upcase }}`
//! - Filters with arguments: `{{ price | times: 1.2 | round: 2 }}`
//! - Tags: `{% if %}`, `{% unless %}`, `{% case %}`, `{% for %}`, `{% cycle %}`,
//!   `{% assign %}`, `{% capture %}`, `{% include %}`, `{% render %}`,
//!   `{% raw %}`, `{% comment %}`
//! - Whitespace control: `{{-`, `-}}`, `{%-`, `-%}`
//!
//! # Architecture
//!
//! A template is scanned and compiled once into an immutable tree of nodes
//! ([`Template`]), then rendered any number of times against [`Bindings`].
//! Tags and filters live in a [`Config`] built through a [`ConfigBuilder`]
//! and frozen before any template is compiled. Values are dynamic
//! ([`Value`]); filters declare the [`Shape`]s they accept and arguments are
//! converted to those shapes before each call.
//!
//! Included templates are read through a [`TemplateStore`] and memoized in a
//! [`TemplateCache`].
//!
//! # Example
//!
//! ```ignore
//! use quarto_liquid::{Bindings, Engine};
//!
//! let engine = Engine::new();
//! let mut bindings = Bindings::new();
//! bindings.insert("name".into(), "World".into());
//!
//! let output = engine.parse_and_render_string("Hello, {{ name }}!", &bindings)?;
//! assert_eq!(output, "Hello, World!");
//! ```

pub mod cache;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod expression;
pub mod filters;
pub mod render;
pub mod source;
pub mod store;
pub mod tags;
pub mod template;
pub mod value;

// Re-export main types at crate root
pub use cache::TemplateCache;
pub use config::{BlockDef, Config, ConfigBuilder, EngineOptions, FilterDef};
pub use convert::{Shape, convert};
pub use engine::{Engine, EngineBuilder};
pub use error::{
    ConversionError, FilterError, StoreError, SyntaxError, TemplateError, TemplateResult,
};
pub use render::RenderContext;
pub use source::SourceLocation;
pub use store::{FileTemplateStore, MemoryTemplateStore, TemplateStore};
pub use template::{Render, Signal, Template};
pub use value::{Bindings, Map, ObjectValue, Value};
