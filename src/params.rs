//! Render parameter builder.
//!
//! Maps one page plus the export options onto the argument of the engine's
//! `window.render(...)` entry point. The literal shape (field names, order,
//! single-quoted strings, six-digit scale) is what `export3.html` expects.

use crate::catalog::{Diagram, Page};
use crate::config::Format;

/// Border in pixels drawn around every exported page.
pub const DEFAULT_BORDER: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub format: Format,
    pub width: i64,
    pub height: i64,
    pub border: i64,
    pub background: String,
    pub page_id: String,
    pub scale: f64,
    pub extras: String,
    pub xml: String,
}

/// Build render parameters for `page` of `diagram`.
///
/// Unparsable `dx`/`dy` become 0 and an unparsable `pageScale` becomes 0.0.
/// This silent fallback is long-standing behavior; the engine copes with
/// zero sizes by laying out the page at its natural extent.
#[must_use]
pub fn build(diagram: &Diagram, page: &Page, format: Format, background: &str) -> RenderParams {
    RenderParams {
        format,
        width: page.width.parse().unwrap_or(0),
        height: page.height.parse().unwrap_or(0),
        border: DEFAULT_BORDER,
        background: background.to_owned(),
        page_id: page.id.clone(),
        scale: page.scale.parse().unwrap_or(0.0),
        extras: String::new(),
        xml: diagram.body.clone(),
    }
}

impl RenderParams {
    /// The object literal passed to `window.render`.
    #[must_use]
    pub fn to_render_call(&self) -> String {
        format!(
            "{{format:{}, w:{}, h:{}, border:{}, bg: {}, pageId:{}, scale:{:.6}, extras: {}, xml:{}}}",
            js_quote(self.format.as_str()),
            self.width,
            self.height,
            self.border,
            js_quote(&self.background),
            js_quote(&self.page_id),
            self.scale,
            js_quote(&self.extras),
            js_quote(&self.xml),
        )
    }

    /// Script evaluated in the page. Reads only `enabled` from the result:
    /// the full return value is too deep to serialize over the protocol.
    #[must_use]
    pub fn render_statement(&self) -> String {
        format!("window.render({}).enabled", self.to_render_call())
    }
}

/// Single-quoted JavaScript string literal.
fn js_quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
#[path = "params_test.rs"]
mod tests;
