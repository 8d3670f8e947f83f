/*
 * store.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template stores.
//!
//! A store maps the name used in `{% include %}` / `{% render %}` to template
//! source bytes. The engine reads through its store at most once per name;
//! compiled results are memoized by the [template cache](crate::cache).

use crate::error::StoreError;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

/// Source of included templates.
///
/// Implementations are shared between concurrent renders.
pub trait TemplateStore: Send + Sync {
    /// Read the source of the template called `name`.
    fn read_template(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// Store that reads templates from a directory.
///
/// `name` is joined onto the root directory as a relative path.
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    root: PathBuf,
}

impl FileTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl Default for FileTemplateStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl TemplateStore for FileTemplateStore {
    fn read_template(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound {
                name: name.to_string(),
            },
            _ => StoreError::Io {
                name: name.to_string(),
                source,
            },
        })
    }
}

/// Store that serves templates from an in-memory map.
///
/// Useful for tests and for templates bundled into the application.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<String, Vec<u8>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<Vec<u8>>) -> &mut Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Create a store with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let mut store = Self::new();
        for (name, source) in templates {
            store.add(name, source);
        }
        store
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn read_template(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }
}
