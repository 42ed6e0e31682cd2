//! Headless Chromium through the DevTools protocol.
//!
//! A fresh browser with its own profile directory is launched for every
//! render and shut down afterwards, so concurrent requests never share state.

use super::{PdfEngine, PdfError, A4_HEIGHT_IN, A4_WIDTH_IN, MARGINS_MM};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures_util::StreamExt;
use log::{debug, warn};
use std::path::PathBuf;

const MM_PER_INCH: f64 = 25.4;

pub struct ChromiumEngine {
    executable: Option<PathBuf>,
}

impl ChromiumEngine {
    pub fn new(executable: Option<PathBuf>) -> Self {
        ChromiumEngine { executable }
    }

    fn config(&self, profile: PathBuf) -> Result<BrowserConfig, PdfError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .user_data_dir(profile);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(PdfError::Launch)
    }
}

/// A4 paper with the letterhead margins; CSS `@page` rules win when present.
pub fn print_params() -> PrintToPdfParams {
    let (top, right, bottom, left) = MARGINS_MM;
    PrintToPdfParams {
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(top / MM_PER_INCH),
        margin_right: Some(right / MM_PER_INCH),
        margin_bottom: Some(bottom / MM_PER_INCH),
        margin_left: Some(left / MM_PER_INCH),
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

#[async_trait]
impl PdfEngine for ChromiumEngine {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let profile = tempfile::tempdir()?;
        let config = self.config(profile.path().to_path_buf())?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PdfError::Launch(e.to_string()))?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Chromium launched");

        let result = print_page(&browser, html).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close Chromium cleanly: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Failed to reap Chromium process: {}", e);
        }
        handle.abort();
        result
    }
}

async fn print_page(browser: &Browser, html: &str) -> Result<Vec<u8>, PdfError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| PdfError::Page(e.to_string()))?;
    page.set_content(html)
        .await
        .map_err(|e| PdfError::Page(e.to_string()))?;
    let pdf = page
        .pdf(print_params())
        .await
        .map_err(|e| PdfError::Page(e.to_string()))?;
    if let Err(e) = page.close().await {
        debug!("Page close failed: {}", e);
    }
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margins_convert_to_inches() {
        let params = print_params();
        assert_eq!(params.paper_width, Some(8.27));
        assert!((params.margin_top.unwrap() - 30.0 / 25.4).abs() < 1e-9);
        assert!((params.margin_left.unwrap() - 16.0 / 25.4).abs() < 1e-9);
        assert_eq!(params.print_background, Some(true));
        assert_eq!(params.prefer_css_page_size, Some(true));
    }

    #[test]
    fn config_honours_explicit_executable() {
        let engine = ChromiumEngine::new(Some(PathBuf::from("/opt/chrome/chrome")));
        let dir = tempfile::tempdir().unwrap();
        assert!(engine.config(dir.path().to_path_buf()).is_ok());
    }
}
