//! Post-processing: deterministic cleanup of rendered text.
//!
//! The renderer leaves layout artefacts behind: padding spaces at the end of
//! wrapped lines, runs of blank lines where block elements were empty,
//! non-breaking spaces from `&nbsp;`, and zero-width characters copied
//! straight out of the source page. This module removes them with cheap,
//! deterministic string/regex rules. Each rule is independently testable.
//!
//! Every rule is idempotent, and so is [`clean_text`] as a whole: cleaning
//! already-clean text returns it unchanged.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so that the per-line rules see `\n`
//! only; invisible characters are removed before trailing whitespace is
//! trimmed so a line ending in `" \u{200B}"` is trimmed fully; blank-line
//! collapsing runs after trimming so whitespace-only lines count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to rendered text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Replace non-breaking spaces with plain spaces
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive newlines down to one blank line
/// 6. Trim leading and trailing blank lines
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = replace_nbsp(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    trim_blank_edges(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Non-breaking spaces ──────────────────────────────────────────────

fn replace_nbsp(input: &str) -> String {
    input.replace(['\u{00A0}', '\u{202F}'], " ")
}

// ── Rule 3: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 6: Trim blank lines at both ends ────────────────────────────────────

fn trim_blank_edges(input: &str) -> String {
    input.trim_matches('\n').to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
