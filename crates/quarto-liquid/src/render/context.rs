/*
 * render/context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render context for template evaluation.
//!
//! The context is threaded through every render call and carries:
//!
//! 1. **Variables**: the caller's bindings plus a stack of local scopes
//!    (template-level assignments, loop variables, include parameters)
//! 2. **State**: cycle counters and the current include depth
//! 3. **Engine access**: grammar, options and the include loader
//! 4. **Cancellation**: an optional flag checked between nodes

use crate::config::{Config, EngineOptions};
use crate::engine::Engine;
use crate::error::{TemplateError, TemplateResult};
use crate::value::{Bindings, Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

static NO_BINDINGS: Map = Map::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    /// Assignments made at template level land here.
    Template,
    /// Holds a loop variable and `forloop`; assignments pass through it.
    Loop,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    vars: Map,
}

/// Mutable state of one render.
#[derive(Debug)]
pub struct RenderContext<'a> {
    engine: &'a Engine,
    globals: &'a Bindings,
    scopes: Vec<Scope>,
    /// Enclosing template for non-isolated includes.
    parent: Option<&'a RenderContext<'a>>,
    /// Shared with every included template of the same render.
    cycles: Rc<RefCell<HashMap<String, usize>>>,
    include_depth: usize,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> RenderContext<'a> {
    pub fn new(engine: &'a Engine, globals: &'a Bindings) -> Self {
        Self {
            engine,
            globals,
            scopes: vec![Scope {
                kind: ScopeKind::Template,
                vars: Map::new(),
            }],
            parent: None,
            cycles: Rc::default(),
            include_depth: 0,
            cancel: None,
        }
    }

    /// Check `flag` between node executions and stop with
    /// [`TemplateError::Cancelled`] once it is set.
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub fn config(&self) -> &'a Config {
        self.engine.config()
    }

    pub fn options(&self) -> &'a EngineOptions {
        self.engine.options()
    }

    pub fn include_depth(&self) -> usize {
        self.include_depth
    }

    pub fn check_cancelled(&self) -> TemplateResult<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(TemplateError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Resolve a top-level variable: innermost scope first, then the caller's
    /// bindings, then the including template.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name))
            .or_else(|| self.globals.get(name))
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }

    /// `assign`/`capture`: set a variable in the nearest template-level scope,
    /// so the value outlives any enclosing loop.
    pub fn assign(&mut self, name: &str, value: Value) {
        let scope = self
            .scopes
            .iter_mut()
            .rev()
            .find(|scope| scope.kind == ScopeKind::Template);
        if let Some(scope) = scope {
            scope.vars.insert(name.to_string(), value);
        }
    }

    /// Set a variable in the innermost scope.
    pub fn set_local(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name.to_string(), value);
        }
    }

    /// Run `f` inside a fresh loop scope, which is dropped afterwards even
    /// if `f` fails.
    pub fn in_loop_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push(Scope {
            kind: ScopeKind::Loop,
            vars: Map::new(),
        });
        let result = f(self);
        self.scopes.pop();
        result
    }

    /// Advance the cycle counter `key` and return the position to emit.
    pub fn next_cycle(&mut self, key: &str, len: usize) -> usize {
        let mut cycles = self.cycles.borrow_mut();
        let counter = cycles.entry(key.to_string()).or_insert(0);
        let position = *counter % len.max(1);
        *counter += 1;
        position
    }

    /// Context for an included template.
    ///
    /// A non-isolated include (`include`) sees the variables of this context;
    /// an isolated one (`render`) sees only `locals`. Either way, assignments
    /// made by the included template stay in the child.
    pub fn include_child(&self, locals: Map, isolated: bool) -> RenderContext<'_> {
        RenderContext {
            engine: self.engine,
            globals: &NO_BINDINGS,
            scopes: vec![Scope {
                kind: ScopeKind::Template,
                vars: locals,
            }],
            parent: if isolated { None } else { Some(self) },
            cycles: Rc::clone(&self.cycles),
            include_depth: self.include_depth + 1,
            cancel: self.cancel,
        }
    }
}
