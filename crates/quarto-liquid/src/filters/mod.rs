/*
 * filters/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in filters.
//!
//! Every filter declares the shapes of its input and arguments; the values a
//! template passes are converted to those shapes before the filter runs, so
//! the functions here only see the kinds of values they asked for.

pub mod extension;
pub mod standard;

pub use extension::register_extension_filters;
pub use standard::register_standard_filters;
