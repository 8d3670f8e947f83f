/*
 * tags/raw.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::config::Config;
use crate::error::TemplateResult;
use crate::render::RenderContext;
use crate::template::{BlockSource, Render, Signal};
use std::io::Write;
use std::sync::Arc;

/// `{% raw %}`: the body, verbatim.
#[derive(Debug)]
pub struct RawRenderer {
    text: String,
}

impl Render for RawRenderer {
    fn render(&self, _ctx: &mut RenderContext<'_>, out: &mut dyn Write) -> TemplateResult<Signal> {
        out.write_all(self.text.as_bytes())?;
        Ok(Signal::Normal)
    }
}

/// `{% comment %}`: nothing.
#[derive(Debug)]
pub struct CommentRenderer;

impl Render for CommentRenderer {
    fn render(&self, _ctx: &mut RenderContext<'_>, _out: &mut dyn Write) -> TemplateResult<Signal> {
        Ok(Signal::Normal)
    }
}

pub fn compile_raw(block: BlockSource, _config: &Config) -> TemplateResult<Arc<dyn Render>> {
    Ok(Arc::new(RawRenderer {
        text: block.raw_text(),
    }))
}

pub fn compile_comment(_block: BlockSource, _config: &Config) -> TemplateResult<Arc<dyn Render>> {
    Ok(Arc::new(CommentRenderer))
}
