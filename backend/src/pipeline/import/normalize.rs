//! Clean-up of converter output.
//!
//! Word-to-HTML conversion emits empty paragraphs and `<br>` runs that show up
//! as large vertical gaps once printed.

use once_cell::sync::Lazy;
use regex::Regex;

/// `<p>` (attributes allowed) holding nothing but whitespace or non-breaking spaces.
static BLANK_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<p(?:\s[^>]*)?>(?:\s|&nbsp;|&#160;|&#xa0;)*</p>").unwrap()
});

static BREAK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:<br\s*/?>\s*){2,}").unwrap());

static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());

/// Removes blank paragraphs, collapses consecutive line breaks into one and
/// strips whitespace between adjacent tags.
pub fn normalize_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let out = BLANK_PARAGRAPH.replace_all(html, "");
    let out = BREAK_RUN.replace_all(&out, "<br>");
    BETWEEN_TAGS.replace_all(&out, "><").into_owned()
}
