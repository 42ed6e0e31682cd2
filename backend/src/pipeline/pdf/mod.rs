//! # Document Renderer
//!
//! Turns prepared HTML into PDF bytes.
//!
//! ## Workflow
//!
//! 1. [`wrap_for_print`] embeds the prepared body in a complete page carrying
//!    [`PRINT_STYLESHEET`] (A4, letterhead margins, justified text, break
//!    avoidance, compact annexure typography).
//! 2. A [`PdfEngine`] lays the page out. [`chromium::ChromiumEngine`] drives a
//!    headless browser per request; [`builtin::BuiltinEngine`] is an offline
//!    genpdf renderer for hosts without Chromium.
//! 3. [`generate_pdf`] bounds the whole render with a timeout. Exceeding it is
//!    a generation failure, never a crash.

pub mod builtin;
pub mod chromium;

use crate::config::{Config, PdfEngineKind};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A4 in inches, as the DevTools protocol expects.
pub const A4_WIDTH_IN: f64 = 8.27;
pub const A4_HEIGHT_IN: f64 = 11.69;

/// Page margins in millimetres: top, right, bottom, left. The larger top margin
/// leaves room for pre-printed letterhead.
pub const MARGINS_MM: (f64, f64, f64, f64) = (30.0, 16.0, 20.0, 16.0);

pub const PRINT_STYLESHEET: &str = r#"
@page { size: A4; margin: 30mm 16mm 20mm 16mm; }
body { font-family: system-ui, "Segoe UI", Roboto, Ubuntu, sans-serif; color: #111; line-height: 1.5; }
h1, h2, h3, strong { color: #000; }
p, li, div, td, th { text-align: justify; text-justify: inter-word; }
h1, h2, h3, h4, h5, h6 { text-align: left; }
.page-break { page-break-before: always; break-before: page; }
.annexure, .annexure-start { page-break-before: always; break-before: page; }
table { width: 100%; border-collapse: collapse; }
td, th { vertical-align: top; }
p, h1, h2, h3, h4, h5, h6,
ul, ol, li,
table, thead, tbody, tr,
blockquote, pre { page-break-inside: avoid; break-inside: avoid; }
p { orphans: 3; widows: 3; }
.annexure-section { font-size: 12px; }
.annexure-section table { width: 100% !important; table-layout: fixed; font-size: 12px !important; }
.annexure-section th, .annexure-section td { padding: 4px 6px !important; line-height: 1.3 !important; word-break: break-word; hyphens: auto; }
"#;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to launch renderer: {0}")]
    Launch(String),

    #[error("failed to render page: {0}")]
    Page(String),

    #[error("PDF engine failed: {0}")]
    Engine(String),

    #[error("failed to load fonts: {0}")]
    Font(String),

    #[error("PDF generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error during PDF generation: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can lay out a complete HTML page as a PDF.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError>;
}

/// Embeds a prepared body in a standalone page with the print stylesheet.
pub fn wrap_for_print(prepared: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n<style>{}</style>\n</head>\n<body>{}</body>\n</html>\n",
        PRINT_STYLESHEET, prepared
    )
}

/// Renders `prepared` with `engine`, failing with [`PdfError::Timeout`] once
/// `timeout` has elapsed.
pub async fn generate_pdf(
    engine: &dyn PdfEngine,
    prepared: &str,
    timeout: Duration,
) -> Result<Vec<u8>, PdfError> {
    let page = wrap_for_print(prepared);
    debug!("Rendering {} bytes of HTML with the {} engine", page.len(), engine.name());
    let pdf = tokio::time::timeout(timeout, engine.render(&page))
        .await
        .map_err(|_| PdfError::Timeout(timeout))??;
    info!("Generated PDF of {} bytes", pdf.len());
    Ok(pdf)
}

/// Normalizes a caller-supplied file name: trimmed, `.pdf` appended when
/// missing, `None` when nothing is left.
pub fn pdf_file_name(requested: Option<&str>) -> Option<String> {
    let name = requested?.trim();
    if name.is_empty() {
        return None;
    }
    if name.to_ascii_lowercase().ends_with(".pdf") {
        Some(name.to_string())
    } else {
        Some(format!("{}.pdf", name))
    }
}

/// Builds the engine selected by configuration.
pub fn engine_from_config(config: &Config) -> Arc<dyn PdfEngine> {
    match config.pdf_engine {
        PdfEngineKind::Chromium => Arc::new(chromium::ChromiumEngine::new(config.chrome_path.clone())),
        PdfEngineKind::Builtin => Arc::new(builtin::BuiltinEngine::new(
            config.font_dir.clone(),
            config.font_family.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct SlowEngine;

    #[async_trait]
    impl PdfEngine for SlowEngine {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn render(&self, _html: &str) -> Result<Vec<u8>, PdfError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(b"%PDF-late".to_vec())
        }
    }

    struct EchoEngine;

    #[async_trait]
    impl PdfEngine for EchoEngine {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError> {
            Ok(html.as_bytes().to_vec())
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(pdf_file_name(None), None);
        assert_eq!(pdf_file_name(Some("   ")), None);
        assert_eq!(pdf_file_name(Some(" offer ")), Some("offer.pdf".into()));
        assert_eq!(pdf_file_name(Some("Offer.PDF")), Some("Offer.PDF".into()));
        assert_eq!(pdf_file_name(Some("a.pdf.txt")), Some("a.pdf.txt.pdf".into()));
    }

    #[test]
    fn wrapped_page_carries_print_rules() {
        let page = wrap_for_print("<p>Hi</p>");
        assert!(page.starts_with("<!doctype html>"));
        assert!(page.contains("@page { size: A4; margin: 30mm 16mm 20mm 16mm; }"));
        assert!(page.contains("p { orphans: 3; widows: 3; }"));
        assert!(page.contains("<body><p>Hi</p></body>"));
    }

    #[actix_web::test]
    async fn generation_passes_wrapped_page_to_engine() {
        let pdf = generate_pdf(&EchoEngine, "<p>x</p>", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(pdf, wrap_for_print("<p>x</p>").into_bytes());
    }

    #[actix_web::test]
    async fn slow_engines_time_out() {
        let timeout = Duration::from_millis(20);
        let err = generate_pdf(&SlowEngine, "<p>x</p>", timeout).await.unwrap_err();
        assert!(matches!(err, PdfError::Timeout(t) if t == timeout));
    }
}
