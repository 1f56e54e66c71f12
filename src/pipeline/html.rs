//! HTML rendering: markup → wrapped text with link targets removed.
//!
//! Rendering goes through `html2text`'s rich mode. In that mode link targets,
//! emphasis and similar markup come back as annotations attached to spans of
//! text rather than as characters in the text itself, so taking only the
//! text of each line yields the anchor text without any URL.
//!
//! Width overflow is allowed: deeply nested blocks (quotes, lists, tables)
//! render wider than `width` instead of failing.

use crate::error::ConversionError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Markup signatures: a tag opener (`<p`, `</`, `<!`, `<?`) or an entity.
static RE_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Za-z!/?]|&(?:#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

/// Returns `true` if `input` contains anything an HTML parser would treat as
/// markup.
pub fn looks_like_html(input: &str) -> bool {
    RE_MARKUP.is_match(input)
}

/// Render `html` as plain text wrapped at `width` columns.
pub fn render_text(html: &str, width: usize) -> Result<String, ConversionError> {
    let lines = html2text::config::rich()
        .allow_width_overflow()
        .lines_from_read(html.as_bytes(), width)
        .map_err(|e| ConversionError::RenderFailed {
            detail: e.to_string(),
        })?;

    let text = lines
        .iter()
        .map(|line| line.tagged_strings().map(|t| t.s.as_str()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");

    debug!("Rendered {} bytes of HTML → {} bytes of text", html.len(), text.len());
    Ok(text)
}
