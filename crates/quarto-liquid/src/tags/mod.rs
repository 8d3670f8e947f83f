/*
 * tags/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Standard tags.

pub mod assign;
pub mod control;
pub mod include;
pub mod iteration;
pub mod raw;

use crate::config::{BlockDef, ConfigBuilder};

/// Register the standard tags and blocks.
pub fn register_standard_tags(builder: &mut ConfigBuilder) {
    builder
        .add_tag("assign", assign::compile_assign)
        .add_tag("break", iteration::compile_break)
        .add_tag("continue", iteration::compile_continue)
        .add_tag("cycle", iteration::compile_cycle)
        .add_tag("include", include::compile_include)
        .add_tag("render", include::compile_render)
        .add_block(BlockDef::new("if", &["elsif", "else"], control::compile_if))
        .add_block(BlockDef::new("unless", &["elsif", "else"], control::compile_unless))
        .add_block(BlockDef::new("case", &["when", "else"], control::compile_case))
        .add_block(BlockDef::new("for", &["else"], iteration::compile_for))
        .add_block(BlockDef::new("capture", &[], assign::compile_capture))
        .add_block(BlockDef::raw("raw", raw::compile_raw))
        .add_block(BlockDef::raw("comment", raw::compile_comment));
}
