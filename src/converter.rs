//! The content converter: HTML in, plain text out.
//!
//! [`ContentConverter`] is the seam between a node and whatever turns markup
//! into text. The node only relies on the contract documented on the trait;
//! [`Html2TextConverter`] is the implementation used when none is configured.

use crate::config::MIN_WRAP_WIDTH;
use crate::error::ConversionError;
use crate::pipeline::{html, postprocess};

/// Converts one HTML payload to plain text.
///
/// Contract:
/// - deterministic and pure; safe to call from several threads at once
/// - strips all markup
/// - replaces each hyperlink with its anchor text, dropping the URL
/// - returns an empty string for empty input
/// - returns [`ConversionError`] for input it cannot render
pub trait ContentConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String, ConversionError>;
}

impl<F> ContentConverter for F
where
    F: Fn(&str) -> Result<String, ConversionError> + Send + Sync,
{
    fn convert(&self, html: &str) -> Result<String, ConversionError> {
        self(html)
    }
}

/// Default converter backed by `html2text`.
///
/// Input without any markup is treated as already-converted text and only
/// cleaned up, so running the converter over its own output returns that
/// output unchanged, provided the output holds nothing that reads as markup.
/// Escaped markup in the source (`&lt;b&gt;`, `&amp;amp;`) decodes to text
/// that does, and a second pass renders it again.
#[derive(Debug, Clone, Copy)]
pub struct Html2TextConverter {
    width: usize,
}

impl Html2TextConverter {
    /// Create a converter that wraps lines at `width` columns.
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl Default for Html2TextConverter {
    fn default() -> Self {
        Self::new(80)
    }
}

impl ContentConverter for Html2TextConverter {
    fn convert(&self, input: &str) -> Result<String, ConversionError> {
        if self.width < MIN_WRAP_WIDTH {
            return Err(ConversionError::TooNarrow { width: self.width });
        }
        if input.trim().is_empty() {
            return Ok(String::new());
        }
        if !html::looks_like_html(input) {
            return Ok(postprocess::clean_text(input));
        }

        let rendered = html::render_text(input, self.width)?;
        Ok(postprocess::clean_text(&rendered))
    }
}
