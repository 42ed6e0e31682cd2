//! Highlight-driven placeholder inference.
//!
//! Any element whose inline style paints a yellow background is an editable
//! field: its text becomes the default value and the source of a key, and the
//! whole element is replaced by `{{key}}`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").unwrap());

static STYLE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|\s)style\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

static YELLOW_BACKGROUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[;\s])background(?:-color)?\s*:\s*(?:yellow|#?ffff00)\b").unwrap()
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Highlighted {
    pub html: String,
    /// Distinct keys in document order.
    pub keys: Vec<String>,
    /// Key → first highlighted text seen for it.
    pub defaults: BTreeMap<String, String>,
}

/// Derives a placeholder key from visible text: lowercase, runs of anything
/// but `[a-z0-9]` become one underscore, outer underscores trimmed. Falls back
/// to `field_<index>` when nothing is left.
pub fn to_safe_key(text: &str, index: usize) -> String {
    let mut key = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            key.push(c);
        } else if !key.ends_with('_') {
            key.push('_');
        }
    }
    let key = key.trim_matches('_');
    if key.is_empty() {
        format!("field_{}", index)
    } else {
        key.to_string()
    }
}

/// Replaces every yellow-highlighted element with a placeholder.
///
/// Matching is nesting-aware: the region ends at the closing tag of the same
/// name at the same depth, so a highlight wrapping other highlights is
/// replaced as a whole. Highlights without a closing tag are left as they are.
pub fn extract_highlighted_placeholders(html: &str) -> Highlighted {
    let mut result = Highlighted::default();
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut search = 0;
    let mut index = 0;

    while let Some(caps) = TAG.captures_at(html, search) {
        let open = caps.get(0).map_or(search..html.len(), |m| m.range());
        search = open.end;

        let attrs = caps.get(3).map_or("", |m| m.as_str());
        if !caps[1].is_empty() || attrs.trim_end().ends_with('/') || !is_highlight(attrs) {
            continue;
        }
        let Some((inner_end, close_end)) = find_closing(html, open.end, &caps[2]) else {
            continue;
        };

        index += 1;
        let text = ANY_TAG.replace_all(&html[open.end..inner_end], "");
        let text = text.trim();
        let key = to_safe_key(&key_source(text), index);

        out.push_str(&html[copied..open.start]);
        out.push_str("{{");
        out.push_str(&key);
        out.push_str("}}");
        copied = close_end;
        search = close_end;

        if !result.keys.contains(&key) {
            result.keys.push(key.clone());
        }
        result.defaults.entry(key).or_insert_with(|| text.to_string());
    }

    out.push_str(&html[copied..]);
    result.html = out;
    result
}

fn is_highlight(attrs: &str) -> bool {
    STYLE_ATTR.captures_iter(attrs).any(|caps| {
        let style = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        YELLOW_BACKGROUND.is_match(style)
    })
}

/// Finds the end of the element named `name` whose content starts at `from`.
/// Returns the content end and the end of the closing tag.
fn find_closing(html: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for caps in TAG.captures_iter(&html[from..]) {
        if !caps[2].eq_ignore_ascii_case(name) {
            continue;
        }
        let m = caps.get(0)?;
        if caps[1].is_empty() {
            if !caps[3].trim_end().ends_with('/') {
                depth += 1;
            }
        } else {
            depth -= 1;
            if depth == 0 {
                return Some((from + m.start(), from + m.end()));
            }
        }
    }
    None
}

fn key_source(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace('\u{a0}', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn safe_keys() {
        assert_eq!(to_safe_key("John Doe", 1), "john_doe");
        assert_eq!(to_safe_key("  Date of Joining: ", 1), "date_of_joining");
        assert_eq!(to_safe_key("CTC (₹)", 1), "ctc");
        assert_eq!(to_safe_key("", 3), "field_3");
        assert_eq!(to_safe_key("***", 2), "field_2");
    }

    #[test]
    fn replaces_single_highlight() {
        let html = r#"<p>Dear <span style="background-color: yellow">John Doe</span>,</p>"#;
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, "<p>Dear {{john_doe}},</p>");
        assert_eq!(out.keys, vec!["john_doe"]);
        assert_eq!(out.defaults["john_doe"], "John Doe");
    }

    #[test]
    fn accepts_hex_and_shorthand_forms() {
        let html = concat!(
            "<b style='background:#FFFF00'>A</b>",
            "<i style=\"color: red; BACKGROUND-COLOR:ffff00\">B</i>",
            "<u style=\"background-color: lightyellow\">C</u>",
        );
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, "{{a}}{{b}}<u style=\"background-color: lightyellow\">C</u>");
        assert_eq!(out.keys, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_labels_share_a_key_and_first_default() {
        let html = concat!(
            r#"<span style="background-color:yellow">Name</span> and "#,
            r#"<span style="background-color:yellow"> name </span>"#,
        );
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, "{{name}} and {{name}}");
        assert_eq!(out.keys, vec!["name"]);
        assert_eq!(out.defaults["name"], "Name");
    }

    #[test]
    fn empty_highlight_uses_counter() {
        let html = concat!(
            r#"<span style="background-color:yellow">Amount</span>"#,
            r#"<span style="background-color:yellow"> </span>"#,
        );
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, "{{amount}}{{field_2}}");
        assert_eq!(out.defaults["field_2"], "");
    }

    #[test]
    fn outer_highlight_wins() {
        let html = concat!(
            r#"<span style="background-color:yellow">Mr <span style="background-color:yellow">X</span> <span>Y</span></span>!"#,
        );
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, "{{mr_x_y}}!");
        assert_eq!(out.keys, vec!["mr_x_y"]);
        assert_eq!(out.defaults["mr_x_y"], "Mr X Y");
    }

    #[test]
    fn nbsp_counts_as_space_for_keys_only() {
        let html = r#"<span style="background-color:yellow">Start&nbsp;Date</span>"#;
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.keys, vec!["start_date"]);
        assert_eq!(out.defaults["start_date"], "Start&nbsp;Date");
    }

    #[test]
    fn unterminated_highlight_is_left_alone() {
        let html = r#"<p><span style="background-color:yellow">Open <b>bold</b></p>"#;
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, html);
        assert!(out.keys.is_empty());
    }

    #[test]
    fn data_style_attribute_is_not_a_highlight() {
        let html = r#"<p><span data-style="background:yellow">Plain</span></p>"#;
        let out = extract_highlighted_placeholders(html);
        assert_eq!(out.html, html);
        assert!(out.keys.is_empty());
    }
}
