//! Layout rendering.
//!
//! A layout is an ordinary template whose `<%= yield %>` marks where the
//! rendered view body goes. The yield slot is already-rendered HTML, so it
//! is spliced in raw.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::TemplateError;
use crate::template::parser::{parse_template, TemplateNode};
use crate::template::renderer;

/// Render layout source around `content`.
pub fn render_with_layout(
    layout_source: &str,
    content: &str,
    data: &IndexMap<String, Value>,
) -> Result<String, TemplateError> {
    let nodes = parse_template(layout_source)?;
    render_layout_nodes(&nodes, content, data)
}

/// Render parsed layout nodes, splicing `content` at `Yield` nodes.
pub fn render_layout_nodes(
    nodes: &[TemplateNode],
    content: &str,
    data: &IndexMap<String, Value>,
) -> Result<String, TemplateError> {
    // Layout wraps content, so output is at least content-sized
    let mut output = String::with_capacity(content.len() + 2048);
    let mut locals = renderer::Locals::new();
    renderer::render_inner(nodes, data, &mut locals, Some(content), &mut output)?;
    Ok(output)
}
