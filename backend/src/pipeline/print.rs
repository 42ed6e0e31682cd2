//! # Print Preparer
//!
//! Makes rendered HTML safe for fixed-page PDF output without a layout engine:
//!
//! 1. Explicit page-break elements (`<hr class="pagebreak">`, empty blocks with
//!    a `pagebreak`/`page-break` class) are rewritten to [`PAGE_BREAK`].
//! 2. A break is inserted before every heading or paragraph whose text starts
//!    with "Annexure", unless one is already there.
//! 3. Everything from the first Annexure block to the end of the document is
//!    wrapped once in an `annexure-section` container for compact typography.
//!
//! Every step checks for its own output first, so the pass is idempotent.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

pub const PAGE_BREAK: &str = r#"<div class="page-break"></div>"#;
const SECTION_OPEN: &str = r#"<div class="annexure-section">"#;

/// Class attribute whose token list contains `pagebreak` or `page-break`.
const BREAK_CLASS: &str = r#"\bclass\s*=\s*["'](?:[^"']*\s)?page-?break(?:\s[^"']*)?["']"#;

static BREAK_HR: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)<hr\b[^>]*{}[^>]*>", BREAK_CLASS)).unwrap());

static BREAK_DIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)<div\b[^>]*{}[^>]*>\s*</div>", BREAK_CLASS)).unwrap());

static BREAK_P: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)<p\b[^>]*{}[^>]*>\s*</p>", BREAK_CLASS)).unwrap());

static ANNEXURE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:h[1-6]|p)\b[^>]*>\s*(?:<(?:strong|b)\b[^>]*>\s*)?annexure").unwrap()
});

static SECTION_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)class\s*=\s*["'][^"']*annexure-section"#).unwrap());

static BODY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</body\s*>").unwrap());

/// Rewrites explicit page-break elements to the canonical marker.
pub fn normalize_page_breaks(html: &str) -> String {
    let out = BREAK_HR.replace_all(html, PAGE_BREAK);
    let out = BREAK_DIV.replace_all(&out, PAGE_BREAK);
    BREAK_P.replace_all(&out, PAGE_BREAK).into_owned()
}

/// Inserts a page break before each Annexure block that lacks one.
///
/// Returns the new HTML and the offset of the break that precedes the first
/// Annexure block, if any.
pub fn break_before_annexures(html: &str) -> (String, Option<usize>) {
    let mut out = String::with_capacity(html.len() + PAGE_BREAK.len());
    let mut first = None;
    let mut copied = 0;

    for m in ANNEXURE_BLOCK.find_iter(html) {
        out.push_str(&html[copied..m.start()]);
        copied = m.start();
        let marker_at = if out.trim_end().ends_with(PAGE_BREAK) {
            out.trim_end().len() - PAGE_BREAK.len()
        } else {
            out.push_str(PAGE_BREAK);
            out.len() - PAGE_BREAK.len()
        };
        first.get_or_insert(marker_at);
    }
    out.push_str(&html[copied..]);
    (out, first)
}

/// Wraps `html[start..]` in the annexure section, closing it before
/// `</body>` when the body ends after `start`.
fn wrap_annexure_section(html: &str, start: usize) -> String {
    let end = BODY_CLOSE
        .find_iter(html)
        .last()
        .map(|m| m.start())
        .filter(|&end| end >= start)
        .unwrap_or(html.len());

    let mut out = String::with_capacity(html.len() + SECTION_OPEN.len() + 6);
    out.push_str(&html[..start]);
    out.push_str(SECTION_OPEN);
    out.push_str(&html[start..end]);
    out.push_str("</div>");
    out.push_str(&html[end..]);
    out
}

/// Prepares rendered HTML for pagination.
pub fn prepare_for_print(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let normalized = normalize_page_breaks(html);
    let (out, first_annexure) = break_before_annexures(&normalized);
    match first_annexure {
        Some(start) if !SECTION_CLASS.is_match(&out) => {
            debug!("Wrapping annexure section starting at byte {}", start);
            wrap_annexure_section(&out, start)
        }
        _ => out,
    }
}
