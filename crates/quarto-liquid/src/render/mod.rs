/*
 * render/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

mod context;

pub use context::RenderContext;
