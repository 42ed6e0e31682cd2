//! Lossy DOCX → HTML conversion.
//!
//! Only the parts that matter for letter templates are kept: headings,
//! paragraphs, simple lists, tables, bold/italic runs, yellow highlights,
//! breaks and embedded images. Everything else in the package is ignored.

use super::{escape_html, ImportError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";
const HIGHLIGHT_OPEN: &str = r#"<span style="background-color: yellow">"#;

/// One run of text with the formatting that affects the HTML output.
#[derive(Debug, Default)]
struct Run {
    html: String,
    bold: bool,
    italic: bool,
    highlight: bool,
}

#[derive(Debug, Default)]
struct Paragraph {
    style: Option<String>,
    list_item: bool,
    page_break: bool,
    runs: Vec<Run>,
    /// Paragraphs nested inside this one's runs (text boxes), emitted after it.
    nested: Vec<Paragraph>,
}

impl Paragraph {
    fn tag(&self) -> String {
        if self.list_item {
            return "li".to_string();
        }
        match self.style.as_deref() {
            Some("Title") => "h1".to_string(),
            Some(style) => match style.strip_prefix("Heading").and_then(|n| n.parse::<u8>().ok()) {
                Some(level @ 1..=6) => format!("h{}", level),
                _ => "p".to_string(),
            },
            None => "p".to_string(),
        }
    }

    /// Adjacent highlighted runs share one highlight span so that a label
    /// split across runs becomes a single placeholder.
    fn inner_html(&self) -> String {
        let mut html = String::new();
        let mut highlighted = false;
        for run in &self.runs {
            if run.highlight != highlighted {
                html.push_str(if run.highlight { HIGHLIGHT_OPEN } else { "</span>" });
                highlighted = run.highlight;
            }
            let mut text = run.html.clone();
            if run.italic {
                text = format!("<em>{}</em>", text);
            }
            if run.bold {
                text = format!("<strong>{}</strong>", text);
            }
            html.push_str(&text);
        }
        if highlighted {
            html.push_str("</span>");
        }
        html
    }
}

struct Converter<'a, 'b> {
    archive: &'a mut ZipArchive<Cursor<&'b [u8]>>,
    rels: HashMap<String, String>,
    out: String,
    paragraphs: Vec<Paragraph>,
    runs: Vec<Run>,
    in_text: bool,
    in_run_props: bool,
    list_open: bool,
}

/// Converts a DOCX package to HTML.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, ImportError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let document = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or(ImportError::MissingPart(DOCUMENT_PART))?;
    let rels = match read_part(&mut archive, RELS_PART)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let mut converter = Converter {
        archive: &mut archive,
        rels,
        out: String::new(),
        paragraphs: Vec::new(),
        runs: Vec::new(),
        in_text: false,
        in_run_props: false,
        list_open: false,
    };
    converter.convert(&document)?;
    debug!("Converted DOCX to {} bytes of HTML", converter.out.len());
    Ok(converter.out)
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, ImportError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn read_binary_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, ImportError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// Relationship id → target path relative to `word/`.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ImportError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, ImportError> {
    for a in e.attributes() {
        let a = a.map_err(xml_error)?;
        if a.key.as_ref() == name {
            return Ok(Some(String::from_utf8_lossy(&a.value).into_owned()));
        }
    }
    Ok(None)
}

/// `true` unless the element carries `w:val` set to an explicit off value.
fn toggle_on(e: &BytesStart<'_>) -> Result<bool, ImportError> {
    Ok(!matches!(
        attr(e, b"w:val")?.as_deref(),
        Some("0") | Some("false") | Some("off") | Some("none")
    ))
}

fn xml_error(e: impl std::fmt::Display) -> ImportError {
    ImportError::Xml(e.to_string())
}

impl Converter<'_, '_> {
    fn convert(&mut self, xml: &str) -> Result<(), ImportError> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().map_err(xml_error)? {
                // Word writes a VML copy of text boxes next to the DrawingML one.
                Event::Start(e) if e.name().as_ref() == b"mc:Fallback" => {
                    reader.read_to_end(e.name()).map_err(xml_error)?;
                }
                Event::Start(e) => self.element(&e, false)?,
                Event::Empty(e) => self.element(&e, true)?,
                Event::End(e) => self.end(e.name().as_ref()),
                Event::Text(t) if self.in_text => {
                    let text = t.unescape().map_err(xml_error)?;
                    if let Some(run) = self.runs.last_mut() {
                        run.html.push_str(&escape_html(&text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        self.close_list();
        Ok(())
    }

    fn element(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), ImportError> {
        match e.name().as_ref() {
            b"w:p" => {
                self.paragraphs.push(Paragraph::default());
                if empty {
                    self.end(b"w:p");
                }
            }
            b"w:pStyle" => {
                if let Some(p) = self.paragraphs.last_mut() {
                    p.style = attr(e, b"w:val")?;
                    if p.style.as_deref() == Some("ListParagraph") {
                        p.list_item = true;
                    }
                }
            }
            b"w:numPr" => {
                if let Some(p) = self.paragraphs.last_mut() {
                    p.list_item = true;
                }
            }
            b"w:r" if !empty => self.runs.push(Run::default()),
            b"w:rPr" if !empty && !self.runs.is_empty() => self.in_run_props = true,
            b"w:b" if self.in_run_props => {
                let on = toggle_on(e)?;
                if let Some(run) = self.runs.last_mut() {
                    run.bold = on;
                }
            }
            b"w:i" if self.in_run_props => {
                let on = toggle_on(e)?;
                if let Some(run) = self.runs.last_mut() {
                    run.italic = on;
                }
            }
            b"w:highlight" if self.in_run_props => {
                let yellow = attr(e, b"w:val")?.is_some_and(|v| v.eq_ignore_ascii_case("yellow"));
                if let Some(run) = self.runs.last_mut() {
                    run.highlight |= yellow;
                }
            }
            b"w:shd" if self.in_run_props => {
                let yellow = attr(e, b"w:fill")?.is_some_and(|v| v.eq_ignore_ascii_case("FFFF00"));
                if let Some(run) = self.runs.last_mut() {
                    run.highlight |= yellow;
                }
            }
            b"w:t" if !empty => self.in_text = true,
            b"w:tab" if !self.runs.is_empty() && !self.in_run_props => self.push_run_html(" "),
            b"w:br" if !self.runs.is_empty() && !self.in_run_props => {
                if attr(e, b"w:type")?.as_deref() == Some("page") {
                    if let Some(p) = self.paragraphs.last_mut() {
                        p.page_break = true;
                    }
                } else {
                    self.push_run_html("<br />");
                }
            }
            b"a:blip" => {
                if let Some(rel) = attr(e, b"r:embed")? {
                    if let Some(img) = self.image(&rel)? {
                        self.push_run_html(&img);
                    }
                }
            }
            b"w:tbl" if !empty => {
                self.close_list();
                self.out.push_str("<table>");
            }
            b"w:tr" if !empty => self.out.push_str("<tr>"),
            b"w:tc" if !empty => self.out.push_str("<td>"),
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => {
                if let (Some(run), Some(p)) = (self.runs.pop(), self.paragraphs.last_mut()) {
                    if !run.html.is_empty() {
                        p.runs.push(run);
                    }
                }
            }
            b"w:p" => {
                if let Some(p) = self.paragraphs.pop() {
                    match self.paragraphs.last_mut() {
                        Some(outer) => outer.nested.push(p),
                        None => self.emit_paragraph(p),
                    }
                }
            }
            b"w:tc" => {
                self.close_list();
                self.out.push_str("</td>");
            }
            b"w:tr" => self.out.push_str("</tr>"),
            b"w:tbl" => self.out.push_str("</table>"),
            _ => {}
        }
    }

    fn push_run_html(&mut self, html: &str) {
        if let Some(run) = self.runs.last_mut() {
            run.html.push_str(html);
        }
    }

    fn emit_paragraph(&mut self, mut p: Paragraph) {
        if p.list_item && !self.list_open {
            self.out.push_str("<ul>");
            self.list_open = true;
        } else if !p.list_item {
            self.close_list();
        }
        let tag = p.tag();
        self.out.push('<');
        self.out.push_str(&tag);
        self.out.push('>');
        self.out.push_str(&p.inner_html());
        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
        if p.page_break {
            self.close_list();
            self.out.push_str(r#"<hr class="pagebreak" />"#);
        }
        for nested in std::mem::take(&mut p.nested) {
            self.emit_paragraph(nested);
        }
    }

    fn close_list(&mut self) {
        if self.list_open {
            self.out.push_str("</ul>");
            self.list_open = false;
        }
    }

    /// Inlines the media part behind `rel` as a data URI.
    fn image(&mut self, rel: &str) -> Result<Option<String>, ImportError> {
        let Some(target) = self.rels.get(rel) else {
            debug!("Image relationship {} not found", rel);
            return Ok(None);
        };
        let path = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("word/{}", target),
        };
        let Some(bytes) = read_binary_part(self.archive, &path)? else {
            debug!("Image part {} missing from package", path);
            return Ok(None);
        };
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        Ok(Some(format!(
            r#"<img src="data:{};base64,{}" />"#,
            mime.essence_str(),
            BASE64.encode(bytes)
        )))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Packages `body` as a minimal DOCX, with optional extra parts.
    pub(crate) fn docx(body: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file(DOCUMENT_PART, options).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
            body
        )
        .unwrap();
        for (name, content) in extra {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn headings_paragraphs_and_formatting() {
        let bytes = docx(
            concat!(
                r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Offer</w:t></w:r></w:p>"#,
                r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r><w:r><w:t xml:space="preserve"> &amp; </w:t></w:r>"#,
                r#"<w:r><w:rPr><w:i/><w:b w:val="0"/></w:rPr><w:t>it</w:t></w:r></w:p>"#,
            ),
            &[],
        );
        assert_eq!(
            docx_to_html(&bytes).unwrap(),
            "<h2>Offer</h2><p><strong>Bold</strong> &amp; <em>it</em></p>"
        );
    }

    #[test]
    fn adjacent_highlighted_runs_form_one_region() {
        let bytes = docx(
            concat!(
                r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r>"#,
                r#"<w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t>John</w:t></w:r>"#,
                r#"<w:r><w:rPr><w:shd w:val="clear" w:fill="FFFF00"/></w:rPr><w:t xml:space="preserve"> Doe</w:t></w:r>"#,
                r#"<w:r><w:t>,</w:t></w:r></w:p>"#,
            ),
            &[],
        );
        assert_eq!(
            docx_to_html(&bytes).unwrap(),
            r#"<p>Dear <span style="background-color: yellow">John Doe</span>,</p>"#
        );
    }

    #[test]
    fn lists_tables_and_breaks() {
        let bytes = docx(
            concat!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr><w:r><w:t>one</w:t></w:r></w:p>"#,
                r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr><w:r><w:t>two</w:t></w:r></w:p>"#,
                r#"<w:p><w:r><w:t>a</w:t><w:br/><w:t>b</w:t><w:tab/><w:t>c</w:t></w:r><w:r><w:br w:type="page"/></w:r></w:p>"#,
                r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            ),
            &[],
        );
        assert_eq!(
            docx_to_html(&bytes).unwrap(),
            concat!(
                "<ul><li>one</li><li>two</li></ul>",
                "<p>a<br />b c</p><hr class=\"pagebreak\" />",
                "<table><tr><td><p>x</p></td></tr></table>",
            )
        );
    }

    #[test]
    fn text_box_paragraphs_follow_their_host() {
        let text_box = concat!(
            r#"<w:txbxContent><w:p><w:pPr><w:pStyle w:val="Heading3"/></w:pPr>"#,
            r#"<w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent>"#,
        );
        let bytes = docx(
            &format!(
                concat!(
                    r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r>"#,
                    r#"<w:r><mc:AlternateContent><mc:Choice Requires="wps"><w:drawing><wps:txbx>{}</wps:txbx></w:drawing></mc:Choice>"#,
                    r#"<mc:Fallback><w:pict><v:textbox>{}</v:textbox></w:pict></mc:Fallback></mc:AlternateContent></w:r>"#,
                    r#"<w:r><w:t>Alex, welcome</w:t></w:r></w:p>"#,
                    r#"<w:p><w:r><w:t>After</w:t></w:r></w:p>"#,
                ),
                text_box, text_box
            ),
            &[],
        );
        assert_eq!(
            docx_to_html(&bytes).unwrap(),
            "<p>Dear Alex, welcome</p><h3>Box</h3><p>After</p>"
        );
    }

    #[test]
    fn images_become_data_uris() {
        let rels = br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId5" Type="image" Target="media/logo.png"/></Relationships>"#;
        let bytes = docx(
            r#"<w:p><w:r><w:drawing><a:graphic><a:graphicData><a:blip r:embed="rId5"/></a:graphicData></a:graphic></w:drawing></w:r></w:p>"#,
            &[(RELS_PART, rels), ("word/media/logo.png", b"PNG")],
        );
        assert_eq!(
            docx_to_html(&bytes).unwrap(),
            r#"<p><img src="data:image/png;base64,UE5H" /></p>"#
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(docx_to_html(b"not a zip"), Err(ImportError::Zip(_))));
        let bytes = docx("<w:p><w:r>", &[]);
        assert!(docx_to_html(&bytes).is_err());
    }

    #[test]
    fn missing_document_part_is_an_error() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(
            docx_to_html(&bytes),
            Err(ImportError::MissingPart(DOCUMENT_PART))
        ));
    }
}
