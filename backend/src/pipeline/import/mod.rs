//! # Import Normalizer
//!
//! Turns an uploaded file into a template body plus suggested placeholders.
//!
//! ## Workflow
//!
//! 1. **Convert**: `.docx` goes through [`docx::docx_to_html`], `.html`/`.htm`
//!    is decoded as UTF-8, anything else is treated as plain text with one
//!    paragraph per non-blank line.
//! 2. **Normalize**: [`normalize::normalize_html`] removes the blank
//!    paragraphs and break runs converters leave behind.
//! 3. **Infer placeholders**: [`highlight::extract_highlighted_placeholders`]
//!    replaces yellow-highlighted regions with `{{key}}`.
//! 4. **Normalize again**, in case the substitution left gaps between tags.

pub mod docx;
pub mod highlight;
pub mod normalize;

use common::model::import::ImportedTemplate;
use highlight::{extract_highlighted_placeholders, Highlighted};
use log::debug;
use normalize::normalize_html;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const DEFAULT_NAME: &str = "Imported Template";

static KNOWN_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(?:html?|docx|txt)$").unwrap());

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file is not a valid DOCX package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("DOCX package has no {0} part")]
    MissingPart(&'static str),

    #[error("malformed DOCX XML: {0}")]
    Xml(String),

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8 text")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Converts `bytes` into a template body according to the extension of
/// `file_name`.
pub fn import_template(bytes: &[u8], file_name: &str) -> Result<ImportedTemplate, ImportError> {
    let lower = file_name.to_ascii_lowercase();
    let html = if lower.ends_with(".docx") {
        docx::docx_to_html(bytes)?
    } else if lower.ends_with(".html") || lower.ends_with(".htm") {
        decode_text(bytes)?.to_string()
    } else {
        text_to_html(decode_text(bytes)?)
    };

    let Highlighted {
        html,
        keys,
        defaults,
    } = extract_highlighted_placeholders(&normalize_html(&html));
    debug!("Imported '{}' with {} placeholder(s)", file_name, keys.len());

    Ok(ImportedTemplate {
        name: template_name(file_name),
        content: normalize_html(&html),
        keys,
        defaults,
    })
}

/// The upload's base name without a known template extension.
pub fn template_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let name = KNOWN_EXTENSION.replace(base, "");
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn decode_text(bytes: &[u8]) -> Result<&str, ImportError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn text_to_html(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>", escape_html(line)))
        .collect()
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn html_round_trip_with_one_highlight() {
        let html = concat!(
            "<h1>Offer Letter</h1>\n<p></p>\n",
            r#"<p>Dear <span style="background-color: yellow">John Doe</span>, welcome.</p>"#,
        );
        let imported = import_template(html.as_bytes(), "offer.HTML").unwrap();
        assert_eq!(imported.name, "offer");
        assert_eq!(
            imported.content,
            "<h1>Offer Letter</h1><p>Dear {{john_doe}}, welcome.</p>"
        );
        assert_eq!(imported.keys, vec!["john_doe"]);
        assert_eq!(imported.defaults["john_doe"], "John Doe");
    }

    #[test]
    fn docx_round_trip_with_one_highlight() {
        let bytes = docx::tests::docx(
            concat!(
                r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r>"#,
                r#"<w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t>John Doe</w:t></w:r></w:p>"#,
                r#"<w:p></w:p>"#,
            ),
            &[],
        );
        let imported = import_template(&bytes, "uploads/Offer.docx").unwrap();
        assert_eq!(imported.name, "Offer");
        assert_eq!(imported.content, "<p>Dear {{john_doe}}</p>");
        assert_eq!(imported.keys, vec!["john_doe"]);
        assert_eq!(imported.defaults["john_doe"], "John Doe");
    }

    #[test]
    fn empty_highlight_falls_back_to_field_counter() {
        let html = r#"<p><span style="background-color:#ffff00"></span></p>"#;
        let imported = import_template(html.as_bytes(), "x.htm").unwrap();
        assert_eq!(imported.keys, vec!["field_1"]);
        assert_eq!(imported.defaults["field_1"], "");
    }

    #[test]
    fn plain_text_becomes_escaped_paragraphs() {
        let text = "\u{feff}Dear <Sir>,\n\n  Terms & conditions  \n";
        let imported = import_template(text.as_bytes(), "notes.txt").unwrap();
        assert_eq!(imported.name, "notes");
        assert_eq!(
            imported.content,
            "<p>Dear &lt;Sir&gt;,</p><p>Terms &amp; conditions</p>"
        );
        assert!(imported.keys.is_empty());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert!(matches!(
            import_template(&[0xff, 0xfe, 0x00], "x.html"),
            Err(ImportError::Encoding(_))
        ));
    }

    #[test]
    fn malformed_docx_is_rejected() {
        assert!(import_template(b"PK broken", "x.docx").is_err());
    }

    #[test]
    fn names() {
        assert_eq!(template_name("Letter.v2.docx"), "Letter.v2");
        assert_eq!(template_name("C:\\docs\\offer.htm"), "offer");
        assert_eq!(template_name(".html"), DEFAULT_NAME);
        assert_eq!(template_name("readme"), "readme");
    }
}
