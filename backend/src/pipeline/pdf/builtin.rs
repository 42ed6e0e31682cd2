//! Offline PDF rendering with genpdf.
//!
//! genpdf has no HTML support, so the page is first reduced to a flat list of
//! [`Block`]s (headings, paragraphs, list items, table rows, images, page
//! breaks) and those are laid out in order. Styling beyond bold/italic, the
//! heading scale and the compact annexure font is not reproduced.

use super::{PdfEngine, PdfError, MARGINS_MM};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use genpdf::elements::{Break, Image as PdfImage, PageBreak, Paragraph};
use genpdf::style::{Style, StyledString};
use genpdf::{Document, Margins, PaperSize, SimplePageDecorator};
use image::imageops::FilterType;
use image::{load_from_memory, DynamicImage, GenericImageView};
use log::debug;
use once_cell::sync::Lazy;
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};
use regex::Regex;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const PAGE_WIDTH_MM: f64 = 210.0;
const IMAGE_DPI: f64 = 150.0;
const BODY_FONT_SIZE: u8 = 11;
const COMPACT_FONT_SIZE: u8 = 9;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>|<!--[\s\S]*?-->|<![^>]*>|([^<]+)").unwrap());

static CLASS_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bclass\s*=\s*["']([^"']*)["']"#).unwrap());

static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']*)["']"#).unwrap());

static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// Fragments with detected styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl TextStyle {
    fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => TextStyle::Regular,
            (true, false) => TextStyle::Bold,
            (false, true) => TextStyle::Italic,
            (true, true) => TextStyle::BoldItalic,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Heading(u8),
    Paragraph,
    ListItem,
    Row,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text {
        kind: TextKind,
        segments: Vec<TextSegment>,
        compact: bool,
    },
    Image(Vec<u8>),
    PageBreak,
}

/// Flattens an HTML page into layout blocks.
pub fn layout_blocks(html: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    for caps in TOKEN.captures_iter(html) {
        if let Some(text) = caps.get(4) {
            builder.text(text.as_str());
            continue;
        }
        let Some(name) = caps.get(2) else {
            continue;
        };
        let name = name.as_str().to_ascii_lowercase();
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        if caps[1].is_empty() {
            builder.open(&name, attrs);
        } else {
            builder.close(&name);
        }
    }
    builder.flush();
    builder.blocks
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    segments: Vec<TextSegment>,
    kind: Option<TextKind>,
    bold: usize,
    italic: usize,
    /// One entry per open `<div>`: whether it opened the annexure section.
    divs: Vec<bool>,
    /// Open `head`/`style`/`script`/`title` elements whose text is not content.
    hidden: usize,
    in_row: bool,
    row_cells: usize,
}

impl BlockBuilder {
    fn compact(&self) -> bool {
        self.divs.iter().any(|&section| section)
    }

    fn open(&mut self, name: &str, attrs: &str) {
        let self_closing = attrs.trim_end().ends_with('/');
        match name {
            "head" | "style" | "script" | "title" if !self_closing => self.hidden += 1,
            "strong" | "b" => self.bold += 1,
            "em" | "i" => self.italic += 1,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.start_block(TextKind::Heading(name.as_bytes()[1] - b'0'))
            }
            "p" => self.start_block(TextKind::Paragraph),
            "li" => self.start_block(TextKind::ListItem),
            "tr" => {
                self.in_row = false;
                self.flush();
                self.in_row = true;
                self.row_cells = 0;
                self.kind = Some(TextKind::Row);
            }
            "td" | "th" => {
                if self.row_cells > 0 {
                    self.push_text("  |  ");
                }
                self.row_cells += 1;
            }
            "br" if self.in_row => self.push_text(" "),
            "br" => self.flush_keep_kind(),
            "hr" => self.flush(),
            "img" => {
                if let Some(bytes) = data_uri_bytes(attrs) {
                    self.flush_keep_kind();
                    self.blocks.push(Block::Image(bytes));
                }
            }
            "div" if !self_closing => {
                let classes = class_list(attrs);
                if classes.iter().any(|c| c == "page-break") {
                    self.flush();
                    self.blocks.push(Block::PageBreak);
                }
                self.flush();
                self.divs.push(classes.iter().any(|c| c == "annexure-section"));
            }
            "ul" | "ol" | "table" => self.flush(),
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "head" | "style" | "script" | "title" => self.hidden = self.hidden.saturating_sub(1),
            "strong" | "b" => self.bold = self.bold.saturating_sub(1),
            "em" | "i" => self.italic = self.italic.saturating_sub(1),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "li" => self.flush(),
            "tr" => {
                self.in_row = false;
                self.flush();
            }
            "div" => {
                self.flush();
                self.divs.pop();
            }
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        if self.hidden > 0 {
            return;
        }
        let decoded = decode_entities(raw);
        let collapsed: String = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !decoded.is_empty() && !self.segments.is_empty() {
                self.push_text(" ");
            }
            return;
        }
        let mut text = String::new();
        if decoded.starts_with(char::is_whitespace) && !self.segments.is_empty() {
            text.push(' ');
        }
        text.push_str(&collapsed);
        if decoded.ends_with(char::is_whitespace) {
            text.push(' ');
        }
        self.push_text(&text);
    }

    fn push_text(&mut self, text: &str) {
        let style = TextStyle::from_flags(self.bold > 0, self.italic > 0);
        match self.segments.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.segments.push(TextSegment {
                text: text.to_string(),
                style,
            }),
        }
    }

    /// Ends the current block; the next text starts a new one of the same kind.
    fn flush_keep_kind(&mut self) {
        let kind = self.kind;
        self.flush();
        self.kind = kind;
    }

    /// Starts a block of `kind`; inside a table row everything joins the row.
    fn start_block(&mut self, kind: TextKind) {
        if self.in_row {
            return;
        }
        self.flush();
        self.kind = Some(kind);
    }

    /// Emits the pending text as a block. A no-op inside a table row, which
    /// only ends at `</tr>`.
    fn flush(&mut self) {
        if self.in_row {
            return;
        }
        let kind = self.kind.take().unwrap_or(TextKind::Paragraph);
        let mut segments = std::mem::take(&mut self.segments);
        if let Some(first) = segments.first_mut() {
            first.text = first.text.trim_start().to_string();
        }
        if let Some(last) = segments.last_mut() {
            last.text = last.text.trim_end().to_string();
        }
        segments.retain(|s| !s.text.is_empty());
        if segments.is_empty() {
            return;
        }
        self.blocks.push(Block::Text {
            kind,
            segments,
            compact: self.compact(),
        });
    }
}

fn class_list(attrs: &str) -> Vec<String> {
    CLASS_ATTR
        .captures(attrs)
        .map(|caps| caps[1].split_whitespace().map(str::to_ascii_lowercase).collect())
        .unwrap_or_default()
}

/// Decodes `src="data:<mime>;base64,<payload>"`; other sources are skipped.
fn data_uri_bytes(attrs: &str) -> Option<Vec<u8>> {
    let caps = SRC_ATTR.captures(attrs)?;
    let src = caps.get(1)?.as_str();
    let (_, payload) = src.strip_prefix("data:")?.split_once(";base64,")?;
    match BASE64.decode(payload.trim()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!("Skipping image with invalid base64 payload: {}", e);
            None
        }
    }
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[derive(Clone)]
pub struct BuiltinEngine {
    font_dir: PathBuf,
    font_family: String,
}

impl BuiltinEngine {
    pub fn new(font_dir: PathBuf, font_family: String) -> Self {
        BuiltinEngine {
            font_dir,
            font_family,
        }
    }

    fn configure_document(&self) -> Result<Document, PdfError> {
        let fonts = genpdf::fonts::from_files(&self.font_dir, &self.font_family, None)
            .map_err(|e| PdfError::Font(format!("{} in {}: {}", self.font_family, self.font_dir.display(), e)))?;
        let mut doc = Document::new(fonts);
        doc.set_paper_size(PaperSize::A4);
        doc.set_font_size(BODY_FONT_SIZE);
        doc.set_line_spacing(1.25);

        let (top, right, bottom, left) = MARGINS_MM;
        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(Margins::trbl(top, right, bottom, left));
        doc.set_page_decorator(decorator);
        Ok(doc)
    }

    fn render_blocking(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let blocks = layout_blocks(html);
        debug!("Laying out {} blocks", blocks.len());
        let mut doc = self.configure_document()?;

        // Keep temporary files alive until rendering finishes
        let mut temp_files: Vec<NamedTempFile> = Vec::new();
        for block in blocks {
            match block {
                Block::Text {
                    kind,
                    segments,
                    compact,
                } => push_text_block(&mut doc, kind, &segments, compact),
                Block::Image(bytes) => push_image(&mut doc, &bytes, &mut temp_files)?,
                Block::PageBreak => doc.push(PageBreak::new()),
            }
        }

        let mut out = Vec::new();
        doc.render(&mut out)
            .map_err(|e| PdfError::Engine(e.to_string()))?;
        Ok(out)
    }
}

#[async_trait]
impl PdfEngine for BuiltinEngine {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let engine = self.clone();
        let html = html.to_string();
        tokio::task::spawn_blocking(move || engine.render_blocking(&html))
            .await
            .map_err(|e| PdfError::Engine(e.to_string()))?
    }
}

fn base_style(kind: TextKind, compact: bool) -> Style {
    let size = match kind {
        TextKind::Heading(1) => 16,
        TextKind::Heading(2) => 14,
        TextKind::Heading(3) => 12,
        _ if compact => COMPACT_FONT_SIZE,
        _ => BODY_FONT_SIZE,
    };
    let style = Style::new().with_font_size(size);
    if matches!(kind, TextKind::Heading(_)) {
        style.bold()
    } else {
        style
    }
}

/// Push segments into a Paragraph converting each `TextSegment` into a `StyledString`.
fn push_segments_into_paragraph(p: &mut Paragraph, segments: &[TextSegment], base: Style) {
    for seg in segments {
        let style = match seg.style {
            TextStyle::Regular => base,
            TextStyle::Bold => base.bold(),
            TextStyle::Italic => base.italic(),
            TextStyle::BoldItalic => base.bold().italic(),
        };
        p.push(StyledString::new(seg.text.clone(), style));
    }
}

fn push_text_block(doc: &mut Document, kind: TextKind, segments: &[TextSegment], compact: bool) {
    let base = base_style(kind, compact);
    let mut p = Paragraph::new("");
    if kind == TextKind::ListItem {
        p.push(StyledString::new("• ", base));
    }
    push_segments_into_paragraph(&mut p, segments, base);
    doc.push(p);
    if !matches!(kind, TextKind::Row | TextKind::ListItem) {
        doc.push(Break::new(if compact { 0.3 } else { 0.6 }));
    }
}

/// Rescales an image to fit the printable width of an A4 page preserving
/// aspect ratio, writes a temporary PNG and embeds it.
fn push_image(
    doc: &mut Document,
    bytes: &[u8],
    temp_files: &mut Vec<NamedTempFile>,
) -> Result<(), PdfError> {
    let img = match load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            debug!("Skipping undecodable image: {}", e);
            return Ok(());
        }
    };
    let (_, right, _, left) = MARGINS_MM;
    let content_width_in = (PAGE_WIDTH_MM - right - left) / 25.4;
    let content_target_px = content_width_in * IMAGE_DPI;

    let (orig_w, orig_h) = img.dimensions();
    let scale = (content_target_px / orig_w as f64).min(1.0);
    let resized: DynamicImage = if scale >= 1.0 {
        img
    } else {
        let new_w = (orig_w as f64 * scale).max(1.0).round() as u32;
        let new_h = (orig_h as f64 * scale).max(1.0).round() as u32;
        img.resize(new_w, new_h, FilterType::Lanczos3)
    };

    // Flatten alpha channel over white background and convert to RGB
    let rgba = resized.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut background = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut background, &rgba, 0, 0);
    let raw = DynamicImage::ImageRgba8(background).to_rgb8().into_raw();

    let mut tmp = NamedTempFile::new()?;
    {
        let file = tmp.as_file_mut();
        let mut encoder = PngEncoder::new(file, w, h);
        encoder.set_color(PngColorType::Rgb);
        encoder.set_depth(PngBitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| PdfError::Engine(e.to_string()))?;
        writer
            .write_image_data(&raw)
            .map_err(|e| PdfError::Engine(e.to_string()))?;
    }

    let mut element = PdfImage::from_path(tmp.path()).map_err(|e| PdfError::Engine(e.to_string()))?;
    element.set_dpi(IMAGE_DPI);
    temp_files.push(tmp);
    doc.push(element);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(kind: TextKind, parts: &[(&str, TextStyle)], compact: bool) -> Block {
        Block::Text {
            kind,
            segments: parts
                .iter()
                .map(|(t, s)| TextSegment {
                    text: t.to_string(),
                    style: *s,
                })
                .collect(),
            compact,
        }
    }

    #[test]
    fn headings_paragraphs_and_runs() {
        let html = "<html><head><style>p { color: red }</style></head><body>\n<h2>Offer</h2>\n<p>Dear <strong>Alex</strong>, <em>welcome</em> &amp; thanks.</p></body></html>";
        assert_eq!(
            layout_blocks(html),
            vec![
                text(TextKind::Heading(2), &[("Offer", TextStyle::Regular)], false),
                text(
                    TextKind::Paragraph,
                    &[
                        ("Dear ", TextStyle::Regular),
                        ("Alex", TextStyle::Bold),
                        (", ", TextStyle::Regular),
                        ("welcome", TextStyle::Italic),
                        (" & thanks.", TextStyle::Regular),
                    ],
                    false
                ),
            ]
        );
    }

    #[test]
    fn lists_rows_and_page_breaks() {
        let html = concat!(
            "<ul><li>one</li><li>two</li></ul>",
            r#"<div class="page-break"></div>"#,
            r#"<div class="annexure-section"><h3>Annexure</h3>"#,
            "<table><tr><th>Item</th><td>42</td></tr></table></div>",
        );
        assert_eq!(
            layout_blocks(html),
            vec![
                text(TextKind::ListItem, &[("one", TextStyle::Regular)], false),
                text(TextKind::ListItem, &[("two", TextStyle::Regular)], false),
                Block::PageBreak,
                text(TextKind::Heading(3), &[("Annexure", TextStyle::Regular)], true),
                text(TextKind::Row, &[("Item  |  42", TextStyle::Regular)], true),
            ]
        );
    }

    #[test]
    fn paragraphs_inside_cells_stay_in_the_row() {
        assert_eq!(
            layout_blocks("<table><tr><td><p>a</p><p>b</p></td><td>c<br>d</td></tr></table><p>e</p>"),
            vec![
                text(TextKind::Row, &[("ab  |  c d", TextStyle::Regular)], false),
                text(TextKind::Paragraph, &[("e", TextStyle::Regular)], false),
            ]
        );
    }

    #[test]
    fn line_breaks_split_paragraphs() {
        assert_eq!(
            layout_blocks("<p>a<br>b</p>"),
            vec![
                text(TextKind::Paragraph, &[("a", TextStyle::Regular)], false),
                text(TextKind::Paragraph, &[("b", TextStyle::Regular)], false),
            ]
        );
    }

    #[test]
    fn data_uri_images_are_decoded() {
        let blocks = layout_blocks(r#"<p><img src="data:image/png;base64,UE5H" /></p><img src="https://x/y.png">"#);
        assert_eq!(blocks, vec![Block::Image(b"PNG".to_vec())]);
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a&nbsp;b &#65;&#x42; &bogus;"), "a\u{a0}b AB &bogus;");
    }

    #[actix_web::test]
    async fn missing_fonts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BuiltinEngine::new(dir.path().to_path_buf(), "Nope".into());
        let err = engine.render("<p>x</p>").await.unwrap_err();
        assert!(matches!(err, PdfError::Font(_)));
    }
}
