use std::fmt;
use std::path::Path;

use crate::context::RequestContext;
use crate::table::ParameterTable;
use crate::types::{ParamKind, Parameter};

/// Serialize a [`ParameterTable`] to a JSON string.
///
/// When `pretty` is `true` the output is indented for readability.
pub fn format_json(table: &ParameterTable, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(table).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    } else {
        serde_json::to_string(table).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Render a [`ParameterTable`] in a human-readable debug format.
pub fn format_debug(table: &ParameterTable) -> String {
    let mut out = String::with_capacity(256);

    out.push_str("=== Parameters ===\n");
    debug_level(table, 0, &mut out);
    out.push_str("==================\n");
    out
}

fn debug_level(table: &ParameterTable, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for (name, param) in table.sorted() {
        out.push_str(&format!(
            "{indent}{name} [valid={} utf8={}]",
            param.valid(),
            param.valid_utf8()
        ));
        if let Some(filename) = param.filename() {
            out.push_str(&format!(" file={filename}"));
        }

        match param.kind() {
            ParamKind::Scalar(buf) => {
                match std::str::from_utf8(buf.as_bytes()) {
                    Ok(s) => out.push_str(&format!(" = {s:?}")),
                    Err(_) => out.push_str(&format!(" = <binary data: {} bytes>", buf.len())),
                }
                out.push('\n');
                if let Some(original) = param.original_value() {
                    out.push_str(&format!(
                        "{indent}  original: {:?}\n",
                        String::from_utf8_lossy(original)
                    ));
                }
            }
            ParamKind::Multi(children) => {
                out.push_str(&format!(" ({} items)\n", children.len()));
                debug_level(children, depth + 1, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// XML document for the rendering stage
// ---------------------------------------------------------------------------

/// Build the XML document describing a request's parameters.
///
/// The root `<parameters>` element carries the request configuration.
/// Each field becomes a `<parameter>` element (sorted by name) with its
/// verdicts, optional filename, `<value>`, optional `<original>`, and for
/// multi-valued fields nested `<parameter>` elements.
pub fn to_xml(ctx: &RequestContext) -> String {
    let config = ctx.config();
    let mut out = String::with_capacity(512);

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<parameters lang=\"{}\" https=\"{}\" chroot=\"{}\">\n",
        escape_xml(config.language.as_bytes()),
        config.https,
        config.chroot
    ));
    xml_level(ctx.table(), 1, &mut out);
    out.push_str("</parameters>\n");
    out
}

fn xml_level(table: &ParameterTable, depth: usize, out: &mut String) {
    for (name, param) in table.sorted() {
        xml_parameter(name, param, depth, out);
    }
}

fn xml_parameter(name: &str, param: &Parameter, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);

    out.push_str(&format!(
        "{indent}<parameter name=\"{}\" valid=\"{}\" utf8=\"{}\"",
        escape_xml(name.as_bytes()),
        param.valid(),
        param.valid_utf8()
    ));
    if let Some(filename) = param.filename() {
        out.push_str(&format!(" filename=\"{}\"", escape_xml(filename.as_bytes())));
    }

    match param.kind() {
        ParamKind::Scalar(buf) => {
            out.push_str(">\n");
            out.push_str(&format!(
                "{indent}  <value>{}</value>\n",
                escape_xml(buf.as_bytes())
            ));
            if let Some(original) = param.original_value() {
                out.push_str(&format!(
                    "{indent}  <original>{}</original>\n",
                    escape_xml(original)
                ));
            }
        }
        ParamKind::Multi(children) => {
            out.push_str(&format!(" length=\"{}\">\n", children.len()));
            xml_level(children, depth + 1, out);
        }
    }

    out.push_str(&format!("{indent}</parameter>\n"));
}

/// Escape markup characters and replace bytes XML 1.0 cannot carry
/// (invalid UTF-8, NUL and other C0 controls) with U+FFFD.
fn escape_xml(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                out.push('\u{FFFD}')
            }
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Rendering handoff
// ---------------------------------------------------------------------------

/// A stylesheet transform failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render failed: {}", self.0)
    }
}

impl std::error::Error for RenderError {}

/// Turns a parameter document into HTML using a stylesheet.
pub trait Transform {
    fn transform(&self, xml: &str, stylesheet: &Path) -> Result<String, RenderError>;
}

/// HTTP status and body of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub status: u16,
    pub body: String,
}

/// Body sent when the transform fails.
pub const FAILURE_PAGE: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html><head><title>Internal Server Error</title></head>",
    "<body><h1>Internal Server Error</h1><p>The page could not be generated.</p></body></html>\n",
);

/// Render a request's parameters through `transform`.
///
/// A transform failure yields [`FAILURE_PAGE`] with status 500.
pub fn render_page(
    transform: &dyn Transform,
    ctx: &RequestContext,
    stylesheet: &Path,
) -> RenderedPage {
    let xml = to_xml(ctx);
    match transform.transform(&xml, stylesheet) {
        Ok(body) => RenderedPage { status: 200, body },
        Err(_e) => {
            crate::trace_warn!(stylesheet = %stylesheet.display(), error = %_e, "render failed");
            RenderedPage {
                status: 500,
                body: FAILURE_PAGE.to_string(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
