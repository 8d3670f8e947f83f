/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled-template cache.
//!
//! Each name gets its own [`OnceCell`], so concurrent renders that include
//! the same template compile it once while renders of other templates
//! proceed. The map lock is held only to find or create a cell, never while
//! reading or compiling.

use crate::error::TemplateResult;
use crate::template::Template;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct CacheEntry {
    template: Arc<Template>,
    /// Set when the entry was seeded explicitly.
    version: Option<u64>,
}

type Slot = Arc<OnceCell<CacheEntry>>;

/// Name → compiled template, shared by all renders of an engine.
#[derive(Debug, Default)]
pub struct TemplateCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // Slots are only ever inserted whole, so a poisoned map is still consistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, name: &str) -> Slot {
        self.slots()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// The cached template called `name`, if it has been loaded.
    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        let slot = self.slots().get(name).cloned()?;
        slot.get().map(|entry| entry.template.clone())
    }

    /// The cached template called `name`, loading it with `load` on a miss.
    ///
    /// Concurrent callers for the same name wait for a single load. A failed
    /// load is not cached; the next caller tries again.
    pub fn get_or_load<F>(&self, name: &str, load: F) -> TemplateResult<Arc<Template>>
    where
        F: FnOnce() -> TemplateResult<Template>,
    {
        let slot = self.slot(name);
        if let Some(entry) = slot.get() {
            tracing::trace!(template = %name, "Template cache hit");
            return Ok(entry.template.clone());
        }
        let entry = slot.get_or_try_init(|| {
            load().map(|template| CacheEntry {
                template: Arc::new(template),
                version: None,
            })
        })?;
        Ok(entry.template.clone())
    }

    /// Store `template` under `name`, replacing any previous entry.
    pub fn insert(&self, name: &str, template: Template, version: Option<u64>) -> Arc<Template> {
        let template = Arc::new(template);
        let entry = CacheEntry {
            template: template.clone(),
            version,
        };
        self.slots()
            .insert(name.to_string(), Arc::new(OnceCell::with_value(entry)));
        template
    }

    /// Seed `name` with a template at a given version.
    ///
    /// If the cache already holds `name` at the same version, that template
    /// is returned and `compile` is not called. Otherwise the result of
    /// `compile` replaces the entry.
    pub fn seed<F>(&self, name: &str, version: u64, compile: F) -> TemplateResult<Arc<Template>>
    where
        F: FnOnce() -> TemplateResult<Template>,
    {
        let existing = self.slots().get(name).cloned();
        let current = existing
            .as_deref()
            .and_then(OnceCell::get)
            .filter(|entry| entry.version == Some(version));
        if let Some(entry) = current {
            tracing::trace!(template = %name, version, "Template cache hit");
            return Ok(entry.template.clone());
        }

        let template = compile()?;
        tracing::debug!(template = %name, version, "Seeded template cache");
        Ok(self.insert(name, template, Some(version)))
    }

    /// Number of loaded templates.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::TemplateError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn template(source: &str) -> TemplateResult<Template> {
        Template::compile(source, &Config::default())
    }

    #[test]
    fn test_get_or_load_loads_once() {
        let cache = TemplateCache::new();
        let loads = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_load("a", || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    template("A")
                })
                .unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.contains("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let cache = TemplateCache::new();
        let err = cache
            .get_or_load("a", || Err(TemplateError::syntax("boom")))
            .unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
        assert!(cache.is_empty());
        assert!(cache.get_or_load("a", || template("A")).is_ok());
        assert!(cache.contains("a"));
    }

    #[test]
    fn test_seed_reuses_same_version() {
        let cache = TemplateCache::new();
        let first = cache.seed("a", 1, || template("A")).unwrap();
        let again = cache
            .seed("a", 1, || panic!("same version must not recompile"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let newer = cache.seed("a", 2, || template("B")).unwrap();
        assert!(!Arc::ptr_eq(&first, &newer));
        assert!(Arc::ptr_eq(&cache.get("a").unwrap(), &newer));
    }

    #[test]
    fn test_concurrent_loads_share_one_compile() {
        let cache = TemplateCache::new();
        let loads = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache
                        .get_or_load("shared", || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            template("shared")
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
